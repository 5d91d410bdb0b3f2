use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StoreError;

/// Which prompt to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Star rating request
    Rating,
    /// Feedback reason picker
    Feedback,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptKind::Rating => f.write_str("rating"),
            PromptKind::Feedback => f.write_str("feedback"),
        }
    }
}

/// A presenter could not start rendering a prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to present {kind} prompt: {message}")]
pub struct PresentError {
    pub kind: PromptKind,
    pub message: String,
}

impl PresentError {
    pub fn new(kind: PromptKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Renders prompts on behalf of the controller.
///
/// `render` returns once the prompt has begun rendering; an `Err` means
/// nothing was shown and no counters will be touched.
pub trait Presenter {
    fn render(&mut self, kind: PromptKind) -> Result<(), PresentError>;
}

impl<F> Presenter for F
where
    F: FnMut(PromptKind) -> Result<(), PresentError>,
{
    fn render(&mut self, kind: PromptKind) -> Result<(), PresentError> {
        self(kind)
    }
}

/// Event sink for integrators. Every method defaults to a no-op, so
/// implementations override only what they track.
pub trait PromptListener: Send {
    /// Star selection changed; `is_final` on submission.
    fn on_rating_changed(&mut self, _stars: i32, _is_final: bool) {}

    /// Feedback reason or text changed; `is_final` on submission.
    fn on_feedback_changed(&mut self, _reason: &str, _text: &str, _is_final: bool) {}

    fn on_prompt_shown(&mut self, _kind: PromptKind) {}

    fn on_prompt_dismissed(&mut self, _kind: PromptKind) {}

    /// Result of the platform review flow.
    fn on_external_review_result(&mut self, _success: bool, _message: &str) {}

    /// The presenter failed; the prompt counts as not shown.
    fn on_prompt_failed(&mut self, _kind: PromptKind, _error: &PresentError) {}

    /// A prompt was shown but recording it failed.
    fn on_store_error(&mut self, _error: &StoreError) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl PromptListener for NoopListener {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_presenters() {
        let mut rendered = Vec::new();
        let mut presenter = |kind: PromptKind| -> Result<(), PresentError> {
            rendered.push(kind);
            Ok(())
        };
        presenter.render(PromptKind::Feedback).unwrap();
        assert_eq!(rendered, vec![PromptKind::Feedback]);
    }

    #[test]
    fn present_error_names_the_prompt() {
        let err = PresentError::new(PromptKind::Rating, "no window");
        assert_eq!(err.to_string(), "failed to present rating prompt: no window");
    }

    #[test]
    fn prompt_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PromptKind::Rating).unwrap(),
            "\"rating\""
        );
    }
}
