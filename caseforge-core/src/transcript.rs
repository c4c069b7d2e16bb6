//! Transcript accumulation over the engine's event stream.
//!
//! One generation request drives one sequential loop over a lazy stream of
//! [`ChatEvent`]s. Accepted fragments are joined with a blank line, every
//! accepted fragment is pushed to a caller-supplied observer (the CLI feeds a
//! live progress display), and consumption stops as soon as the sentinel
//! token appears in an event's payload. Events past the sentinel are never
//! requested from the stream.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::ChatEvent;

/// Sentinel announced by the reviewing participant when the cases pass review.
/// A legitimate test case containing this token truncates the run early; that
/// fragility is inherent to the protocol and deliberately not papered over.
pub const DEFAULT_SENTINEL: &str = "APPROVE";

/// Engine run summaries start with this prefix and are never part of the
/// transcript.
pub const TASK_RESULT_PREFIX: &str = "TaskResult";

/// Where in a fragment a sentinel match is allowed to terminate the run.
///
/// The two source lineages of this loop disagreed: one stopped on a match at
/// any offset (`find >= 0`), the other required the sentinel to sit past the
/// first character (`find > 0`). Both behaviors are kept selectable rather
/// than guessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SentinelMatch {
    /// A match anywhere in the fragment terminates, including offset zero.
    AnyOffset,
    /// A match only terminates at a positive offset; a fragment that *starts*
    /// with the sentinel does not stop the run.
    #[default]
    InteriorOnly,
}

impl SentinelMatch {
    fn triggers(self, content: &str, sentinel: &str) -> bool {
        match content.find(sentinel) {
            None => false,
            Some(offset) => match self {
                Self::AnyOffset => true,
                Self::InteriorOnly => offset > 0,
            },
        }
    }
}

/// Options for one accumulation run.
#[derive(Debug, Clone)]
pub struct AccumulateOptions {
    pub sentinel: String,
    pub sentinel_match: SentinelMatch,
}

impl Default for AccumulateOptions {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_owned(),
            sentinel_match: SentinelMatch::default(),
        }
    }
}

/// State for a single generation request.
///
/// Consumed by value: a finished or failed run cannot be re-entered, which
/// replaces the "is a generation running" flag the UI layer would otherwise
/// have to keep in sync.
#[derive(Debug)]
pub struct GenerationRun {
    options: AccumulateOptions,
}

impl GenerationRun {
    pub fn new(options: AccumulateOptions) -> Self {
        Self { options }
    }

    /// Consume the event stream and return the accumulated transcript.
    ///
    /// Skips events whose payload is empty or a `TaskResult` summary. Invokes
    /// `on_fragment` with the transcript so far after every accepted fragment.
    /// A mid-stream error propagates as-is and the partial transcript is
    /// dropped with this run; there is no partial-result recovery.
    pub async fn accumulate<S, F>(self, events: S, mut on_fragment: F) -> Result<String>
    where
        S: Stream<Item = Result<ChatEvent>>,
        F: FnMut(&str),
    {
        let mut events = std::pin::pin!(events);
        let mut transcript = String::new();

        while let Some(event) = events.next().await {
            let event = event?;
            let content = event.content();

            if !content.is_empty() && !content.starts_with(TASK_RESULT_PREFIX) {
                if !transcript.is_empty() {
                    transcript.push_str("\n\n");
                }
                transcript.push_str(content);
                on_fragment(&transcript);
            }

            // The sentinel check applies to every payload, accepted or not,
            // matching the engine-side termination condition.
            if self
                .options
                .sentinel_match
                .triggers(content, &self.options.sentinel)
            {
                tracing::debug!(sentinel = %self.options.sentinel, "sentinel observed, stopping consumption");
                break;
            }
        }

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaseError;
    use futures::executor::block_on;
    use futures::stream;
    use std::cell::Cell;

    fn run(
        events: Vec<Result<ChatEvent>>,
        options: AccumulateOptions,
    ) -> Result<String> {
        block_on(GenerationRun::new(options).accumulate(stream::iter(events), |_| {}))
    }

    #[test]
    fn test_joins_all_fragments_without_sentinel() {
        let events = vec![
            Ok(ChatEvent::final_text("case table", "testcase_writer")),
            Ok(ChatEvent::delta("str", "critic")),
            Ok(ChatEvent::final_text("review notes", "critic")),
        ];
        let transcript = run(events, AccumulateOptions::default()).unwrap();
        assert_eq!(transcript, "case table\n\nreview notes");
    }

    #[test]
    fn test_skips_empty_and_task_result_payloads() {
        let events = vec![
            Ok(ChatEvent::final_text("", "testcase_writer")),
            Ok(ChatEvent::final_text("| a | b |", "testcase_writer")),
            Ok(ChatEvent::opaque("TaskResult(messages=..., stop_reason=...)")),
        ];
        let transcript = run(events, AccumulateOptions::default()).unwrap();
        assert_eq!(transcript, "| a | b |");
    }

    #[test]
    fn test_stops_at_sentinel_and_pulls_nothing_further() {
        let pulled = Cell::new(0usize);
        let events = stream::iter(vec![
            Ok(ChatEvent::final_text("cases", "testcase_writer")),
            Ok(ChatEvent::final_text("looks good APPROVE", "critic")),
            Ok(ChatEvent::final_text("never delivered", "testcase_writer")),
        ])
        .map(|event| {
            pulled.set(pulled.get() + 1);
            event
        });

        let transcript = block_on(
            GenerationRun::new(AccumulateOptions::default()).accumulate(events, |_| {}),
        )
        .unwrap();

        // The sentinel fragment itself is included; the stream is not drained.
        assert_eq!(transcript, "cases\n\nlooks good APPROVE");
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn test_sentinel_at_offset_zero_interior_only() {
        let events = vec![
            Ok(ChatEvent::final_text("APPROVE at the very start", "critic")),
            Ok(ChatEvent::final_text("still running", "testcase_writer")),
        ];
        let transcript = run(events, AccumulateOptions::default()).unwrap();
        assert_eq!(transcript, "APPROVE at the very start\n\nstill running");
    }

    #[test]
    fn test_sentinel_at_offset_zero_any_offset() {
        let options = AccumulateOptions {
            sentinel_match: SentinelMatch::AnyOffset,
            ..AccumulateOptions::default()
        };
        let events = vec![
            Ok(ChatEvent::final_text("APPROVE at the very start", "critic")),
            Ok(ChatEvent::final_text("never delivered", "testcase_writer")),
        ];
        let transcript = run(events, options).unwrap();
        assert_eq!(transcript, "APPROVE at the very start");
    }

    #[test]
    fn test_mid_stream_error_propagates() {
        let events = vec![
            Ok(ChatEvent::final_text("partial", "testcase_writer")),
            Err(CaseError::generation("model endpoint timeout")),
        ];
        let err = run(events, AccumulateOptions::default()).unwrap_err();
        assert!(matches!(err, CaseError::Generation { .. }));
    }

    #[test]
    fn test_observer_sees_growing_transcript() {
        let mut snapshots = Vec::new();
        let events = stream::iter(vec![
            Ok(ChatEvent::final_text("one", "testcase_writer")),
            Ok(ChatEvent::final_text("two", "critic")),
        ]);
        block_on(
            GenerationRun::new(AccumulateOptions::default())
                .accumulate(events, |so_far: &str| snapshots.push(so_far.to_owned())),
        )
        .unwrap();
        assert_eq!(snapshots, vec!["one".to_owned(), "one\n\ntwo".to_owned()]);
    }

    #[test]
    fn test_empty_stream_yields_empty_transcript() {
        let transcript = run(Vec::new(), AccumulateOptions::default()).unwrap();
        assert!(transcript.is_empty());
    }
}
