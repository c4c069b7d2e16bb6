//! OpenAI-compatible chat-completions client.
//!
//! One client per configured model endpoint. Generation parameters
//! (max_tokens / temperature / top_p) travel with the [`ModelConfig`]; the
//! per-call timeout is applied at client construction.

use std::time::Duration;

use base64::Engine as _;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use caseforge_core::{CaseError, ModelConfig, Result};

use crate::sse::DeltaStream;

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// System prompt for the image-recognition path: UI screenshots become layout
/// descriptions, flowcharts become Mermaid, everything else becomes prose.
const IMAGE_RECOGNITION_SYSTEM: &str = "你是一个专业的图片内容识别专家。请分析图片内容并按照以下规则输出：\n\
1. 如果是UI界面图：详细描述界面布局、组件、功能区域，说明各个按钮、输入框、菜单等元素的位置和作用。\n\
2. 如果是流程图：转换为Mermaid流程图语法，保持原有的逻辑关系和流程顺序。\n\
3. 如果是其他类型的图：提供详细的文字描述，说明图片的主要内容和关键信息。\n\
请直接输出识别结果，不要添加额外的解释。";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: content.into(),
        }
    }
}

pub struct ChatClient {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ModelConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaseError::generation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Complete one turn, returning the final message text.
    pub async fn complete(&self, messages: &[Message]) -> Result<String> {
        let response = self.post(messages, false).await?;
        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CaseError::generation(format!("malformed completion response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CaseError::generation("completion response carried no content"))
    }

    /// Stream one turn as text deltas.
    pub async fn stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.post(messages, true).await?;
        Ok(DeltaStream::new(response.bytes_stream()).boxed())
    }

    /// Describe an image for the document-parsing path.
    ///
    /// Never fails the surrounding parse: recognition errors come back as the
    /// bracketed substitute text that replaces the image in the document.
    pub async fn describe_image(&self, image: &[u8], mime: &str, label: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let messages = [
            Message::system(IMAGE_RECOGNITION_SYSTEM),
            Message::user(format!(
                "请识别以下图片内容：\n\n![图片](data:{mime};base64,{encoded})\n\n请根据图片类型进行相应的处理。"
            )),
        ];

        match self.complete(&messages).await {
            Ok(description) if !description.trim().is_empty() => description.trim().to_owned(),
            Ok(_) => format!("[图片识别失败: {label}]"),
            Err(e) => {
                tracing::warn!(label, error = %e, "image recognition failed");
                format!("[图片识别错误: {label}]")
            }
        }
    }

    async fn post(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            stream,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        };

        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaseError::generation(format!("model request timed out: {e}"))
                } else {
                    CaseError::generation(format!("model request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaseError::generation(format!(
                "model endpoint returned {status}: {body}"
            )));
        }

        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
