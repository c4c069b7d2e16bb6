//! Round-robin agent team over chat backends.
//!
//! Reimplements the consumer-visible contract of a multi-participant group
//! chat: run with a task string, yield a lazy sequence of step events, stop
//! when a termination text appears or the turn ceiling is hit, then emit one
//! trailing `TaskResult` summary event.
//!
//! Events travel through a capacity-1 channel, so the engine never runs more
//! than one event ahead of the consumer; when the consumer stops pulling
//! (sentinel observed), the next send fails and the conversation aborts
//! without issuing further model calls.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use caseforge_core::{ChatEvent, Result};

use crate::client::{ChatClient, Message};

/// Seam between the team engine and a model endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Complete one turn, returning the final text.
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Stream one turn as text deltas. Defaults to a single delta holding the
    /// whole completion for backends without streaming support.
    async fn stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        let text = self.complete(messages).await?;
        Ok(futures::stream::once(async move { Ok(text) }).boxed())
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        ChatClient::complete(self, messages).await
    }

    async fn stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        ChatClient::stream(self, messages).await
    }
}

/// One participant: a named role with a system message bound to a backend.
#[derive(Clone)]
pub struct Agent {
    name: String,
    system_message: String,
    streaming: bool,
    backend: Arc<dyn ChatBackend>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            streaming: false,
            backend,
        }
    }

    /// Emit per-token delta events for this participant's turns.
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Project the shared conversation into this agent's view: its own turns
    /// as assistant messages, everyone else's as user messages.
    fn build_messages(&self, history: &[(String, String)]) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_message)];
        for (speaker, text) in history {
            if *speaker == self.name {
                messages.push(Message::assistant(text.clone()));
            } else {
                messages.push(Message::user(text.clone()));
            }
        }
        messages
    }
}

/// Conversation completes when a participant's text contains this token.
///
/// The token must never appear in legitimate test-case content; if it does,
/// the conversation is truncated there. That fragility is part of the
/// protocol and intentionally not worked around.
#[derive(Debug, Clone)]
pub struct TextMentionTermination {
    text: String,
}

impl TextMentionTermination {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    fn is_met(&self, content: &str) -> bool {
        content.contains(&self.text)
    }
}

pub struct RoundRobinTeam {
    participants: Vec<Agent>,
    termination: TextMentionTermination,
    max_turns: u32,
}

impl RoundRobinTeam {
    pub fn new(
        participants: Vec<Agent>,
        termination: TextMentionTermination,
        max_turns: u32,
    ) -> Self {
        Self {
            participants,
            termination,
            max_turns,
        }
    }

    /// Run the conversation, yielding events lazily.
    ///
    /// A backend failure mid-conversation surfaces as an `Err` item; nothing
    /// is retried.
    pub fn run_stream(self, task: String) -> impl Stream<Item = Result<ChatEvent>> {
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            if let Err(err) = self.drive(task, &tx).await {
                let _ = tx.send(Err(err)).await;
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    }

    async fn drive(self, task: String, tx: &mpsc::Sender<Result<ChatEvent>>) -> Result<()> {
        let mut history: Vec<(String, String)> = vec![("user".to_owned(), task)];
        let mut stop_reason = format!("Maximum number of turns {} reached", self.max_turns);

        for turn in 0..self.max_turns {
            let agent = &self.participants[turn as usize % self.participants.len()];
            let messages = agent.build_messages(&history);
            tracing::debug!(turn, agent = agent.name(), "requesting turn");

            let text = if agent.streaming {
                let mut deltas = agent.backend.stream(&messages).await?;
                let mut full = String::new();
                while let Some(delta) = deltas.next().await {
                    let delta = delta?;
                    full.push_str(&delta);
                    if tx
                        .send(Ok(ChatEvent::delta(delta, agent.name())))
                        .await
                        .is_err()
                    {
                        return Ok(());
                    }
                }
                full
            } else {
                agent.backend.complete(&messages).await?
            };

            history.push((agent.name().to_owned(), text.clone()));
            if tx
                .send(Ok(ChatEvent::final_text(text.clone(), agent.name())))
                .await
                .is_err()
            {
                // Consumer hung up; stop issuing model calls.
                return Ok(());
            }

            if self.termination.is_met(&text) {
                stop_reason = format!("Text '{}' mentioned", self.termination.text);
                break;
            }
        }

        let _ = tx
            .send(Ok(ChatEvent::opaque(format!(
                "TaskResult(messages={}, stop_reason='{}')",
                history.len(),
                stop_reason
            ))))
            .await;
        Ok(())
    }
}
