//! Prompt controller.
//!
//! Orchestrates session start, the policy check, the one-shot dismiss
//! flag and the write-back of shows and ratings.
//!
//! ## State Transitions
//!
//! ```text
//! Uninitialized -> Initialized -> (reset) -> Uninitialized -> Initialized
//! ```
//!
//! `Initialized` carries an independent `dismiss_next` flag that swallows
//! exactly one show request.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = PromptController::new(PromptStore::open("rate_pref")?);
//! controller.initialize(config, true)?;
//! controller.request_show(PromptKind::Rating, false, &mut presenter);
//! // later, from the presenter:
//! let route = controller.report_outcome(5, true)?;
//! ```

mod outcome;
mod presenter;

pub use outcome::{RatingRoute, ShowOutcome, SkipReason};
pub use presenter::{NoopListener, PresentError, Presenter, PromptKind, PromptListener};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};
use crate::policy::{evaluate, Decision, DisableScope, PolicyConfig, MAX_STARS};
use crate::storage::{KvBackend, PromptStore, SqliteKv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Uninitialized,
    Initialized,
}

/// Owns the store handle and the policy for one prompt namespace.
pub struct PromptController<B: KvBackend = SqliteKv> {
    store: PromptStore<B>,
    config: Option<PolicyConfig>,
    state: ControllerState,
    dismiss_next: bool,
    listener: Box<dyn PromptListener>,
}

impl<B: KvBackend> PromptController<B> {
    /// Create an uninitialized controller over `store`.
    pub fn new(store: PromptStore<B>) -> Self {
        Self {
            store,
            config: None,
            state: ControllerState::Uninitialized,
            dismiss_next: false,
            listener: Box::new(NoopListener),
        }
    }

    /// Replace the event listener.
    pub fn with_listener(mut self, listener: impl PromptListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ControllerState::Initialized
    }

    pub fn is_dismiss_next_armed(&self) -> bool {
        self.dismiss_next
    }

    pub fn config(&self) -> Option<&PolicyConfig> {
        self.config.as_ref()
    }

    pub fn store(&self) -> &PromptStore<B> {
        &self.store
    }

    pub fn is_rated(&self) -> bool {
        self.store.is_rated()
    }

    /// Evaluate the policy without consuming the dismiss flag or touching
    /// the store. `None` until initialized.
    pub fn can_show(&self, now: DateTime<Utc>) -> Option<Decision> {
        if !self.is_initialized() {
            return None;
        }
        let config = self.config.as_ref()?;
        Some(evaluate(config, &self.store.snapshot(), now))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a session with `config`.
    ///
    /// Ignored when already initialized or when `enabled` is false. Bumps
    /// the session counter once and persists the config's scopes.
    ///
    /// # Errors
    /// Returns a store error if the write fails; the store and controller
    /// are then left as they were.
    pub fn initialize(&mut self, config: PolicyConfig, enabled: bool) -> Result<(), CoreError> {
        if self.is_initialized() {
            tracing::debug!("initialize ignored: already initialized");
            return Ok(());
        }
        if !enabled {
            tracing::info!("prompting disabled, controller left uninitialized");
            return Ok(());
        }

        let disable_scope = config.settings().disable_scope;
        let interval_scope = config.settings().interval_scope;
        let session = self.store.start_session(disable_scope, interval_scope)?;
        self.config = Some(config);
        self.state = ControllerState::Initialized;
        tracing::info!(session, %disable_scope, %interval_scope, "prompt controller initialized");
        Ok(())
    }

    /// Erase all persisted state and start over with the same config.
    ///
    /// # Errors
    /// Returns a store error if clearing or re-initializing fails.
    pub fn reset(&mut self) -> Result<(), CoreError> {
        self.store.clear_all()?;
        self.state = ControllerState::Uninitialized;
        self.dismiss_next = false;
        tracing::info!("prompt state reset");

        match self.config.take() {
            Some(config) => self.initialize(config, true),
            None => Ok(()),
        }
    }

    // ── Show requests ────────────────────────────────────────────────

    /// Skip exactly the next show request, whatever its kind.
    pub fn arm_dismiss_next(&mut self) {
        tracing::debug!("dismiss-next armed");
        self.dismiss_next = true;
    }

    /// Request a prompt now. See [`request_show_at`](Self::request_show_at).
    pub fn request_show(
        &mut self,
        kind: PromptKind,
        force_immediate: bool,
        presenter: &mut dyn Presenter,
    ) -> ShowOutcome {
        self.request_show_at(kind, force_immediate, presenter, Utc::now())
    }

    /// Request a prompt at `now`.
    ///
    /// Order: not initialized skips silently; an armed dismiss flag is
    /// consumed and skips; otherwise the policy runs unless
    /// `force_immediate`. A presenter failure is reported through the
    /// listener and leaves the store untouched.
    pub fn request_show_at(
        &mut self,
        kind: PromptKind,
        force_immediate: bool,
        presenter: &mut dyn Presenter,
        now: DateTime<Utc>,
    ) -> ShowOutcome {
        let config = match (&self.state, &self.config) {
            (ControllerState::Initialized, Some(config)) => config,
            _ => return ShowOutcome::Skipped(SkipReason::NotInitialized),
        };

        if self.dismiss_next {
            self.dismiss_next = false;
            tracing::info!(%kind, "show skipped: dismiss-next consumed");
            return ShowOutcome::Skipped(SkipReason::DismissedNext);
        }

        if !force_immediate {
            let decision = evaluate(config, &self.store.snapshot(), now);
            if !decision.allow {
                tracing::info!(%kind, reasons = decision.reasons.len(), "show denied by policy");
                return ShowOutcome::Skipped(SkipReason::Denied(decision));
            }
        }

        if let Err(e) = presenter.render(kind) {
            tracing::warn!(%kind, error = %e, "presenter failed, prompt not shown");
            self.listener.on_prompt_failed(kind, &e);
            return ShowOutcome::Failed(e);
        }

        self.listener.on_prompt_shown(kind);
        tracing::info!(%kind, forced = force_immediate, "prompt shown");

        match self.store.record_show(now) {
            Ok(()) => ShowOutcome::Shown { recorded: true },
            Err(e) => {
                tracing::warn!(%kind, error = %e, "failed to record show");
                self.listener.on_store_error(&e);
                ShowOutcome::Shown { recorded: false }
            }
        }
    }

    // ── Presenter reports ────────────────────────────────────────────

    /// Star selection from the rating prompt.
    ///
    /// A final rating is persisted and marks the user as rated; the
    /// returned route says what the presenter should do next. Before
    /// initialization no prompt can have been shown, so the rating is
    /// ignored and the route is `Close`.
    ///
    /// # Errors
    /// Returns a validation error for stars outside `0..=5` (nothing is
    /// persisted), or a store error if a write fails.
    pub fn report_outcome(&mut self, stars: i32, is_final: bool) -> Result<RatingRoute, CoreError> {
        if !(0..=MAX_STARS).contains(&stars) {
            return Err(ValidationError::OutOfRange {
                field: "stars".into(),
                value: stars.into(),
                min: 0,
                max: MAX_STARS.into(),
            }
            .into());
        }

        let config = match (&self.state, &self.config) {
            (ControllerState::Initialized, Some(config)) => config,
            _ => {
                tracing::debug!(stars, "rating ignored: controller not initialized");
                return Ok(RatingRoute::Close);
            }
        };

        self.listener.on_rating_changed(stars, is_final);
        if !is_final {
            return Ok(RatingRoute::Pending);
        }

        self.store.record_stars(stars)?;
        self.store.mark_rated(true)?;

        let threshold = config.settings().disable_after_stars;
        if threshold > 0
            && stars >= threshold
            && self.store.disable_scope() == DisableScope::Session
        {
            self.store.disable_this_session()?;
        }

        let route = RatingRoute::for_rating(config, stars);
        tracing::info!(stars, ?route, "rating submitted");
        Ok(route)
    }

    /// Reason or text change from the feedback prompt.
    ///
    /// # Errors
    /// Returns a validation error if the reason id is unknown, or if a
    /// final submission lacks text its reason requires.
    pub fn report_feedback(
        &mut self,
        reason_id: &str,
        text: &str,
        is_final: bool,
    ) -> Result<(), CoreError> {
        let reason = self
            .config
            .as_ref()
            .and_then(|c| c.feedback_reason(reason_id))
            .ok_or_else(|| ValidationError::UnknownReason(reason_id.to_string()))?;

        if is_final && !reason.accepts(text) {
            return Err(ValidationError::InputRequired(reason_id.to_string()).into());
        }

        self.listener.on_feedback_changed(&reason.title, text, is_final);
        if is_final {
            tracing::info!(reason = %reason.id, "feedback submitted");
        }
        Ok(())
    }

    pub fn report_dismissed(&mut self, kind: PromptKind) {
        self.listener.on_prompt_dismissed(kind);
    }

    pub fn report_external_review(&mut self, success: bool, message: &str) {
        if !success {
            tracing::warn!(detail = message, "external review flow failed");
        }
        self.listener.on_external_review_result(success, message);
    }
}
