//! Prompt gating policy.
//!
//! [`PolicySettings`] is the plain, serializable shape that lives in
//! `config.toml`. [`PolicyConfig`] is the validated, immutable form the
//! controller owns for its whole lifetime; it is only obtainable through
//! [`PolicyConfig::new`], which rejects negative thresholds and missing
//! app identity fields.

mod evaluator;

pub use evaluator::{evaluate, Decision, DenyReason};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::storage::StateSnapshot;

/// Highest star count a rating prompt can produce.
pub const MAX_STARS: i32 = 5;

/// Placeholder substituted with the package id in store listing templates.
pub const PACKAGE_ID_PLACEHOLDER: &str = "{package_id}";

/// How long a "stop prompting" outcome lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisableScope {
    /// Only until the next session starts
    #[default]
    Session,
    /// Permanently
    Forever,
}

impl DisableScope {
    pub fn as_str(self) -> &'static str {
        match self {
            DisableScope::Session => "SESSION",
            DisableScope::Forever => "FOREVER",
        }
    }

    /// Parse a persisted value. Unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SESSION" => Some(DisableScope::Session),
            "FOREVER" => Some(DisableScope::Forever),
            _ => None,
        }
    }
}

impl fmt::Display for DisableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the minimum-interval clock restarts every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntervalScope {
    /// The clock is cleared when a session starts
    #[default]
    Session,
    /// The clock persists across sessions
    Global,
}

impl IntervalScope {
    pub fn as_str(self) -> &'static str {
        match self {
            IntervalScope::Session => "SESSION",
            IntervalScope::Global => "GLOBAL",
        }
    }

    /// Parse a persisted value. Unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SESSION" => Some(IntervalScope::Session),
            "GLOBAL" => Some(IntervalScope::Global),
            _ => None,
        }
    }
}

impl fmt::Display for IntervalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the host application, used for store links and feedback mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppIdentity {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub package_id: String,
    #[serde(default)]
    pub support_email: String,
    #[serde(default = "default_store_url_template")]
    pub store_url_template: String,
}

fn default_store_url_template() -> String {
    format!("https://play.google.com/store/apps/details?id={PACKAGE_ID_PLACEHOLDER}")
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            package_id: String::new(),
            support_email: String::new(),
            store_url_template: default_store_url_template(),
        }
    }
}

impl AppIdentity {
    /// Render the store listing URL for this package.
    pub fn store_listing_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .store_url_template
            .replace(PACKAGE_ID_PLACEHOLDER, &self.package_id);
        Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
            key: "app.store_url_template".into(),
            message: format!("'{raw}' is not a valid URL: {e}"),
        })
    }
}

/// One selectable reason in the feedback prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReason {
    #[serde(default = "new_reason_id")]
    pub id: String,
    pub title: String,
    /// Submission needs accompanying free text.
    #[serde(default)]
    pub requires_input: bool,
}

fn new_reason_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl FeedbackReason {
    pub fn new(title: impl Into<String>, requires_input: bool) -> Self {
        Self {
            id: new_reason_id(),
            title: title.into(),
            requires_input,
        }
    }

    /// Whether a final submission with `text` is acceptable for this reason.
    pub fn accepts(&self, text: &str) -> bool {
        !self.requires_input || !text.trim().is_empty()
    }
}

/// Numeric and boolean gating thresholds, as stored in `config.toml`.
///
/// Zero disables a cap or interval. Values are signed so that a bad file
/// can be reported instead of silently wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Sessions required before any prompt.
    #[serde(default = "default_min_sessions")]
    pub min_sessions: i32,
    /// Show only on sessions where `session_count % (N + 1) == 0`.
    #[serde(default)]
    pub session_interval: i32,
    #[serde(default = "default_max_shows_per_session")]
    pub max_shows_per_session: i32,
    #[serde(default)]
    pub min_interval_millis: i64,
    #[serde(default)]
    pub interval_scope: IntervalScope,
    #[serde(default)]
    pub max_total_shows: i32,
    /// A final rating at or above this disables future prompts.
    #[serde(default = "default_disable_after_stars")]
    pub disable_after_stars: i32,
    #[serde(default = "default_disable_scope")]
    pub disable_scope: DisableScope,
    /// Ratings at or below this are routed to the feedback prompt.
    #[serde(default = "default_max_stars_for_feedback")]
    pub max_stars_for_feedback: i32,
    /// Ratings at or below this (and above the feedback cut) open a review.
    #[serde(default = "default_review_max_stars")]
    pub review_max_stars: i32,
    /// Send reviewers to the store listing instead of the in-app flow.
    #[serde(default)]
    pub disable_in_app_review: bool,
}

fn default_min_sessions() -> i32 {
    1
}
fn default_max_shows_per_session() -> i32 {
    1
}
fn default_disable_after_stars() -> i32 {
    4
}
fn default_disable_scope() -> DisableScope {
    DisableScope::Forever
}
fn default_max_stars_for_feedback() -> i32 {
    3
}
fn default_review_max_stars() -> i32 {
    MAX_STARS
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            min_sessions: default_min_sessions(),
            session_interval: 0,
            max_shows_per_session: default_max_shows_per_session(),
            min_interval_millis: 0,
            interval_scope: IntervalScope::default(),
            max_total_shows: 0,
            disable_after_stars: default_disable_after_stars(),
            disable_scope: default_disable_scope(),
            max_stars_for_feedback: default_max_stars_for_feedback(),
            review_max_stars: default_review_max_stars(),
            disable_in_app_review: false,
        }
    }
}

impl PolicySettings {
    /// Settings with every gate switched off.
    pub fn permissive() -> Self {
        Self {
            min_sessions: 0,
            session_interval: 0,
            max_shows_per_session: 0,
            min_interval_millis: 0,
            interval_scope: IntervalScope::Session,
            max_total_shows: 0,
            disable_after_stars: 0,
            disable_scope: DisableScope::Session,
            max_stars_for_feedback: 0,
            review_max_stars: MAX_STARS,
            disable_in_app_review: false,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("policy.min_sessions", self.min_sessions.into())?;
        non_negative("policy.session_interval", self.session_interval.into())?;
        non_negative(
            "policy.max_shows_per_session",
            self.max_shows_per_session.into(),
        )?;
        non_negative("policy.min_interval_millis", self.min_interval_millis)?;
        non_negative("policy.max_total_shows", self.max_total_shows.into())?;
        star_threshold("policy.disable_after_stars", self.disable_after_stars)?;
        star_threshold("policy.max_stars_for_feedback", self.max_stars_for_feedback)?;
        star_threshold("policy.review_max_stars", self.review_max_stars)?;
        Ok(())
    }
}

fn non_negative(key: &str, value: i64) -> Result<(), ConfigError> {
    if value < 0 {
        return Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("must be >= 0, got {value}"),
        });
    }
    Ok(())
}

fn star_threshold(key: &str, value: i32) -> Result<(), ConfigError> {
    if !(0..=MAX_STARS).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("must be within 0..={MAX_STARS}, got {value}"),
        });
    }
    Ok(())
}

fn required(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingKey(key.into()));
    }
    Ok(())
}

/// Escape-hatch predicate evaluated against the current state snapshot.
pub type Predicate = Arc<dyn Fn(&StateSnapshot) -> bool + Send + Sync>;

/// Validated, immutable gating configuration.
#[derive(Clone)]
pub struct PolicyConfig {
    app: AppIdentity,
    settings: PolicySettings,
    feedback_reasons: Vec<FeedbackReason>,
    store_url: Url,
    custom_veto: Option<Predicate>,
    force_show: Option<Predicate>,
}

impl PolicyConfig {
    /// Validate and freeze a configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingKey`] when an app identity field is
    /// empty, and [`ConfigError::InvalidValue`] for negative or out-of-range
    /// thresholds, an unparsable store URL, or duplicate reason ids.
    pub fn new(
        app: AppIdentity,
        settings: PolicySettings,
        feedback_reasons: Vec<FeedbackReason>,
    ) -> Result<Self, ConfigError> {
        required("app.app_name", &app.app_name)?;
        required("app.package_id", &app.package_id)?;
        required("app.support_email", &app.support_email)?;
        if !app.support_email.contains('@') {
            return Err(ConfigError::InvalidValue {
                key: "app.support_email".into(),
                message: format!("'{}' is not an email address", app.support_email),
            });
        }
        settings.validate()?;

        let mut seen = HashSet::new();
        for reason in &feedback_reasons {
            required("feedback_reasons.id", &reason.id)?;
            if !seen.insert(reason.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "feedback_reasons.id".into(),
                    message: format!("duplicate reason id '{}'", reason.id),
                });
            }
        }

        let store_url = app.store_listing_url()?;

        Ok(Self {
            app,
            settings,
            feedback_reasons,
            store_url,
            custom_veto: None,
            force_show: None,
        })
    }

    /// Attach a veto: returning `false` blocks the show.
    pub fn with_custom_veto<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateSnapshot) -> bool + Send + Sync + 'static,
    {
        self.custom_veto = Some(Arc::new(predicate));
        self
    }

    /// Attach a force-show override: returning `true` bypasses every rule.
    pub fn with_force_show<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateSnapshot) -> bool + Send + Sync + 'static,
    {
        self.force_show = Some(Arc::new(predicate));
        self
    }

    pub fn app(&self) -> &AppIdentity {
        &self.app
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    pub fn feedback_reasons(&self) -> &[FeedbackReason] {
        &self.feedback_reasons
    }

    pub fn feedback_reason(&self, id: &str) -> Option<&FeedbackReason> {
        self.feedback_reasons.iter().find(|r| r.id == id)
    }

    pub fn store_url(&self) -> &Url {
        &self.store_url
    }

    pub fn custom_veto(&self) -> Option<&Predicate> {
        self.custom_veto.as_ref()
    }

    pub fn force_show(&self) -> Option<&Predicate> {
        self.force_show.as_ref()
    }
}

impl fmt::Debug for PolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyConfig")
            .field("app", &self.app)
            .field("settings", &self.settings)
            .field("feedback_reasons", &self.feedback_reasons)
            .field("store_url", &self.store_url.as_str())
            .field("custom_veto", &self.custom_veto.is_some())
            .field("force_show", &self.force_show.is_some())
            .finish()
    }
}
