//! # rategate Core Library
//!
//! Decides, once per request, whether an interruption prompt (a rating or
//! feedback request) should be shown, based on persisted usage counters and
//! a fixed-shape policy. Rendering is left to the host through the
//! [`Presenter`] and [`PromptListener`] traits; the CLI binary drives the
//! same library against the on-disk store.
//!
//! ## Architecture
//!
//! - **Store**: SQLite-backed, namespaced key/value counters with
//!   documented defaults ([`PromptStore`])
//! - **Policy**: validated immutable thresholds ([`PolicyConfig`]) and a
//!   pure, non-short-circuiting evaluator ([`evaluate`])
//! - **Controller**: session start, one-shot dismiss, show recording and
//!   reset ([`PromptController`])
//! - **Config**: TOML file holding app identity, thresholds and the
//!   feedback reason catalog ([`Config`])

pub mod controller;
pub mod error;
pub mod policy;
pub mod storage;

pub use controller::{
    ControllerState, NoopListener, PresentError, Presenter, PromptController, PromptKind,
    PromptListener, RatingRoute, ShowOutcome, SkipReason,
};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use policy::{
    evaluate, AppIdentity, Decision, DenyReason, DisableScope, FeedbackReason, IntervalScope,
    PolicyConfig, PolicySettings, MAX_STARS,
};
pub use storage::{Config, KvBackend, MemoryKv, PromptStore, SqliteKv, StateSnapshot};
