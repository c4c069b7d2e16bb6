//! `caseforge generate` - run the writer/reviewer team and project the result.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use caseforge_core::{
    extract_rows, project, AccumulateOptions, CaseforgeConfig, CategoryWeights, GenerationRun,
    SentinelMatch, TaskSpec, SEPARATOR_MARKER,
};
use caseforge_llm::{Agent, ChatClient, RoundRobinTeam, TextMentionTermination};

use crate::ui;

/// Writer system message. The `{{...}}` placeholders are replaced with the
/// category weight percentages before the run.
const WRITER_SYSTEM_MESSAGE: &str = "你是一名资深软件测试工程师，负责根据需求描述编写测试用例。
要求：
1、测试用例必须以Markdown表格输出，表头为：| 用例编号 | 用例名称 | 优先级 | 前置条件 | 操作步骤 | 预期结果 |
2、用例分类占比：功能用例{{functional_testing}}%、边界用例{{boundary_testing}}%、异常用例{{exception_testing}}%、性能用例{{perfmon_testing}}%、回归用例{{regression_testing}}%
3、收到评审意见后，根据意见修改并重新输出全部测试用例，不要只输出修改的部分。";

const REVIEWER_SYSTEM_MESSAGE: &str = "你是一名测试评审专家，负责评审测试用例的覆盖度和正确性。
逐条检查测试用例是否覆盖需求描述中的功能点、边界条件和异常场景，指出遗漏和错误。
如果测试用例全部合格，仅回复 APPROVE。";

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Requirement description text (or use --in to read from a file)
    #[arg(value_name = "TEXT")]
    requirement: Option<String>,

    /// Read the requirement description from a file instead
    #[arg(long = "in", value_name = "PATH", conflicts_with = "requirement")]
    input: Option<PathBuf>,

    /// Directory the output files are written to
    #[arg(long = "out", value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// File-name stem for the outputs (<stem>.md and <stem>.xlsx)
    #[arg(long, default_value = "testcases")]
    stem: String,

    /// Minimum number of cases to generate
    #[arg(long)]
    min_cases: Option<u32>,

    /// Maximum number of cases to generate
    #[arg(long)]
    max_cases: Option<u32>,

    /// Priority label applied to the whole batch (急/高/中/低)
    #[arg(long)]
    priority: Option<String>,

    /// Text/markdown file of manually written cases for the reviewer to
    /// compare against
    #[arg(long, value_name = "PATH")]
    cases: Option<PathBuf>,

    /// Category weight percentages: functional,boundary,exception,perfmon,regression
    #[arg(long, value_delimiter = ',', num_args = 5, value_name = "N,N,N,N,N")]
    weights: Option<Vec<u8>>,

    /// Also stop when a fragment starts with the sentinel token
    #[arg(long)]
    sentinel_any_offset: bool,

    /// Override the writer system message with a template file
    #[arg(long, value_name = "PATH")]
    writer_prompt: Option<PathBuf>,

    /// Override the reviewer system message with a file
    #[arg(long, value_name = "PATH")]
    reviewer_prompt: Option<PathBuf>,
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    let requirement = match (&args.requirement, &args.input) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read requirement file: {}", path.display()))?,
        (None, None) => String::new(),
    };

    let manual_cases = match &args.cases {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read cases file: {}", path.display()))?,
        ),
        None => None,
    };

    let weights = match &args.weights {
        Some(w) => CategoryWeights {
            functional: w[0],
            boundary: w[1],
            exception: w[2],
            perfmon: w[3],
            regression: w[4],
        },
        None => CategoryWeights::default(),
    };
    if weights.sum() != 100 {
        warn!(sum = weights.sum(), "category weights do not sum to 100");
    }

    // Input validation happens before any model call
    let task = TaskSpec {
        requirement,
        min_cases: args.min_cases,
        max_cases: args.max_cases,
        priority: args.priority.clone(),
        manual_cases,
    }
    .render()?;

    let config = CaseforgeConfig::load()?;
    config.validate_credentials()?;
    let timeout = Duration::from_secs(config.generation.request_timeout_secs);

    let writer_message = weights.apply(&load_prompt(&args.writer_prompt, WRITER_SYSTEM_MESSAGE)?);
    let reviewer_message = load_prompt(&args.reviewer_prompt, REVIEWER_SYSTEM_MESSAGE)?;

    let writer_backend = Arc::new(ChatClient::new(config.writer.clone(), timeout)?);
    let mut participants = vec![Agent::new("testcase_writer", writer_message, writer_backend)];

    let max_turns = match &config.reviewer {
        Some(reviewer) => {
            let reviewer_backend = Arc::new(ChatClient::new(reviewer.clone(), timeout)?);
            participants.push(
                Agent::new("critic", reviewer_message, reviewer_backend).with_streaming(),
            );
            config.generation.max_turns
        }
        // No reviewer configured: single writer turn, no review loop
        None => 1,
    };

    info!(
        writer = %config.writer.model,
        reviewer = config.reviewer.as_ref().map(|r| r.model.as_str()),
        max_turns,
        "starting generation"
    );

    let team = RoundRobinTeam::new(
        participants,
        TextMentionTermination::new(config.generation.sentinel.as_str()),
        max_turns,
    );
    let events = team.run_stream(task);

    let pb = ui::spinner("正在生成测试用例...");
    let options = AccumulateOptions {
        sentinel: config.generation.sentinel.clone(),
        sentinel_match: if args.sentinel_any_offset {
            SentinelMatch::AnyOffset
        } else {
            SentinelMatch::InteriorOnly
        },
    };

    let transcript = match GenerationRun::new(options)
        .accumulate(events, |so_far| {
            if let Some(pb) = &pb {
                pb.set_message(format!("正在生成测试用例... 已输出 {} 字", so_far.chars().count()));
            }
        })
        .await
    {
        Ok(transcript) => transcript,
        Err(err) => {
            ui::finish_error(pb, format!("生成测试用例时出错: {err}"));
            return Err(err.into());
        }
    };

    let rows = extract_rows(&transcript);
    if rows.is_empty() {
        ui::finish_error(pb, "未能从会话中提取到测试用例表格");
        bail!("no test-case rows found in the conversation transcript");
    }

    let projection = project(&rows)?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create output directory: {}", args.output.display()))?;
    let md_path = args.output.join(format!("{}.md", args.stem));
    let xlsx_path = args.output.join(format!("{}.xlsx", args.stem));
    fs::write(&md_path, &projection.markdown)
        .with_context(|| format!("failed to write {}", md_path.display()))?;
    fs::write(&xlsx_path, &projection.workbook)
        .with_context(|| format!("failed to write {}", xlsx_path.display()))?;

    // Header and separator rows are not cases
    let case_count = rows
        .iter()
        .filter(|row| !row.contains(SEPARATOR_MARKER))
        .count()
        .saturating_sub(1);
    ui::finish_success(pb, format!("测试用例生成完成，共 {case_count} 条"));

    println!("{}", md_path.display());
    println!("{}", xlsx_path.display());

    Ok(())
}

fn load_prompt(path: &Option<PathBuf>, default: &str) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file: {}", path.display())),
        None => Ok(default.to_owned()),
    }
}
