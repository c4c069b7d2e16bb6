//! Assembly of the task string handed to the writer/reviewer team.
//!
//! The templates are the literal sentences the models were tuned against
//! upstream; they are interpolated, never rephrased.

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, Result};

/// Case-category weighting percentages, substituted into the writer's system
/// message. Informally expected to sum to 100; not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub functional: u8,
    pub boundary: u8,
    pub exception: u8,
    pub perfmon: u8,
    pub regression: u8,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            functional: 55,
            boundary: 25,
            exception: 20,
            perfmon: 0,
            regression: 0,
        }
    }
}

impl CategoryWeights {
    /// Substitute the `{{...}}` placeholders in a writer system message.
    pub fn apply(&self, system_message: &str) -> String {
        system_message
            .replace("{{functional_testing}}", &self.functional.to_string())
            .replace("{{boundary_testing}}", &self.boundary.to_string())
            .replace("{{exception_testing}}", &self.exception.to_string())
            .replace("{{perfmon_testing}}", &self.perfmon.to_string())
            .replace("{{regression_testing}}", &self.regression.to_string())
    }

    pub fn sum(&self) -> u32 {
        u32::from(self.functional)
            + u32::from(self.boundary)
            + u32::from(self.exception)
            + u32::from(self.perfmon)
            + u32::from(self.regression)
    }
}

/// Structured parameters of one generation request.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    /// Free-text requirement description. Required.
    pub requirement: String,
    /// Lower bound on generated case count.
    pub min_cases: Option<u32>,
    /// Upper bound on generated case count.
    pub max_cases: Option<u32>,
    /// Priority label applied to the whole batch (急/高/中/低).
    pub priority: Option<String>,
    /// Manually written cases the reviewer compares against.
    pub manual_cases: Option<String>,
}

impl TaskSpec {
    /// Render the task string for the engine.
    ///
    /// A missing requirement is an input-validation failure raised here,
    /// before any model call is made.
    pub fn render(&self) -> Result<String> {
        let requirement = self.requirement.trim();
        if requirement.is_empty() {
            return Err(CaseError::invalid_input("需求描述不能为空"));
        }

        let mut task = format!("需求描述：{requirement}");

        if let Some(priority) = self.priority.as_deref().filter(|p| !p.is_empty() && *p != "--") {
            task.push_str(&format!("\n测试优先级：{priority}"));
        }

        match (self.min_cases, self.max_cases) {
            (Some(min), Some(max)) if min != max => {
                task.push_str(&format!(
                    "\n【重要】：最少生成{min}条用例，最多生成{max}条用例"
                ));
            }
            (Some(count), _) | (None, Some(count)) if count > 0 => {
                task.push_str(&format!("\n【重要】请生成 {count} 条测试用例，不允许少。"));
            }
            _ => {}
        }

        if let Some(cases) = self.manual_cases.as_deref().filter(|c| !c.trim().is_empty()) {
            task.push_str(&format!("\n评审需要对比的人工测试用例：{cases}"));
        }

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_requirement_is_rejected() {
        let err = TaskSpec::default().render().unwrap_err();
        assert!(matches!(err, CaseError::InvalidInput { .. }));

        let err = TaskSpec {
            requirement: "   \n".to_owned(),
            ..TaskSpec::default()
        }
        .render()
        .unwrap_err();
        assert!(matches!(err, CaseError::InvalidInput { .. }));
    }

    #[test]
    fn test_requirement_only() {
        let task = TaskSpec {
            requirement: "用户注册功能".to_owned(),
            ..TaskSpec::default()
        }
        .render()
        .unwrap();
        assert_eq!(task, "需求描述：用户注册功能");
    }

    #[test]
    fn test_count_range_template() {
        let task = TaskSpec {
            requirement: "登录".to_owned(),
            min_cases: Some(5),
            max_cases: Some(10),
            ..TaskSpec::default()
        }
        .render()
        .unwrap();
        assert_eq!(
            task,
            "需求描述：登录\n【重要】：最少生成5条用例，最多生成10条用例"
        );
    }

    #[test]
    fn test_exact_count_and_priority() {
        let task = TaskSpec {
            requirement: "登录".to_owned(),
            min_cases: Some(8),
            max_cases: Some(8),
            priority: Some("高".to_owned()),
            ..TaskSpec::default()
        }
        .render()
        .unwrap();
        assert_eq!(
            task,
            "需求描述：登录\n测试优先级：高\n【重要】请生成 8 条测试用例，不允许少。"
        );
    }

    #[test]
    fn test_placeholder_priority_is_dropped() {
        let task = TaskSpec {
            requirement: "登录".to_owned(),
            priority: Some("--".to_owned()),
            ..TaskSpec::default()
        }
        .render()
        .unwrap();
        assert_eq!(task, "需求描述：登录");
    }

    #[test]
    fn test_manual_cases_appended_last() {
        let task = TaskSpec {
            requirement: "登录".to_owned(),
            manual_cases: Some("| 用例 | 结果 |".to_owned()),
            ..TaskSpec::default()
        }
        .render()
        .unwrap();
        assert!(task.ends_with("评审需要对比的人工测试用例：| 用例 | 结果 |"));
    }

    #[test]
    fn test_weights_substitution() {
        let weights = CategoryWeights::default();
        let message = weights.apply("功能{{functional_testing}}% 回归{{regression_testing}}%");
        assert_eq!(message, "功能55% 回归0%");
        assert_eq!(weights.sum(), 100);
    }
}
