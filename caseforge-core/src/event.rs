use serde::{Deserialize, Serialize};

/// One unit of output from the conversational engine.
///
/// The engine adapter produces this closed union at the boundary; the core
/// never inspects arbitrary objects to decide how to read their text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChatEvent {
    /// Incremental streaming chunk from a model that streams token-by-token.
    /// Carries no accumulator payload; only the turn's final text is recorded.
    TextDelta {
        text: String,
        speaker: Option<String>,
    },
    /// Complete text of one participant's turn.
    FinalText {
        text: String,
        speaker: Option<String>,
    },
    /// Anything else the engine emits (run summaries, control frames),
    /// reduced to its string representation.
    Opaque { repr: String },
}

impl ChatEvent {
    pub fn delta(text: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self::TextDelta {
            text: text.into(),
            speaker: Some(speaker.into()),
        }
    }

    pub fn final_text(text: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self::FinalText {
            text: text.into(),
            speaker: Some(speaker.into()),
        }
    }

    pub fn opaque(repr: impl Into<String>) -> Self {
        Self::Opaque { repr: repr.into() }
    }

    /// Payload as seen by the transcript accumulator: the turn text for a
    /// final event, the string representation for an opaque event, empty for
    /// streaming deltas (which are display-only).
    pub fn content(&self) -> &str {
        match self {
            Self::TextDelta { .. } => "",
            Self::FinalText { text, .. } => text,
            Self::Opaque { repr } => repr,
        }
    }

    /// Which participant produced this event, when known.
    pub fn speaker(&self) -> Option<&str> {
        match self {
            Self::TextDelta { speaker, .. } | Self::FinalText { speaker, .. } => {
                speaker.as_deref()
            }
            Self::Opaque { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_per_kind() {
        assert_eq!(ChatEvent::delta("tok", "critic").content(), "");
        assert_eq!(ChatEvent::final_text("done", "writer").content(), "done");
        assert_eq!(ChatEvent::opaque("TaskResult(...)").content(), "TaskResult(...)");
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ChatEvent::final_text("hi", "writer")).unwrap();
        assert!(json.contains("\"kind\":\"final-text\""));
    }
}
