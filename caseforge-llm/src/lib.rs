/*!
 * caseforge-llm - Chat-completion clients and the round-robin agent team
 *
 * This crate talks to OpenAI-compatible model endpoints and reimplements the
 * consumer-visible contract of a group-chat engine: run a task, yield a lazy
 * event stream, terminate on a text mention or a turn ceiling.
 */

pub mod client;
pub mod sse;
pub mod team;

pub use client::{ChatClient, Message};
pub use sse::DeltaStream;
pub use team::{Agent, ChatBackend, RoundRobinTeam, TextMentionTermination};
