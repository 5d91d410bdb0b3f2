//! Show/skip decision over a state snapshot.
//!
//! Every rule is checked (apart from the force-show fast path) so that a
//! denial lists all of the conditions that blocked it, in a fixed order:
//! custom veto, stars, time interval, session periodicity, minimum
//! sessions, total cap, per-session cap.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DisableScope, IntervalScope, PolicyConfig};
use crate::storage::StateSnapshot;

/// Why a show was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum DenyReason {
    /// The custom veto predicate returned false.
    CustomVeto,
    /// A previous rating reached the disable threshold.
    DisabledAfterStars {
        last_stars: i32,
        threshold: i32,
        scope: DisableScope,
    },
    /// Not enough time since the last show.
    MinInterval {
        elapsed_ms: i64,
        min_interval_ms: i64,
        scope: IntervalScope,
    },
    /// Current session is not on the periodic schedule.
    SessionInterval {
        session_count: i32,
        session_interval: i32,
        remainder: i64,
    },
    MinSessions {
        session_count: i32,
        min_sessions: i32,
    },
    MaxTotalShows { total_shows: i32, max_total_shows: i32 },
    MaxShowsPerSession {
        shows_this_session: i32,
        max_shows_per_session: i32,
    },
}

impl DenyReason {
    /// Stable short identifier, suitable for logs and scripts.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::CustomVeto => "custom-veto",
            DenyReason::DisabledAfterStars { .. } => "disabled-after-stars",
            DenyReason::MinInterval { .. } => "min-interval",
            DenyReason::SessionInterval { .. } => "session-interval",
            DenyReason::MinSessions { .. } => "min-sessions",
            DenyReason::MaxTotalShows { .. } => "max-total-shows",
            DenyReason::MaxShowsPerSession { .. } => "max-shows-per-session",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::CustomVeto => f.write_str("custom-veto"),
            DenyReason::DisabledAfterStars {
                last_stars,
                threshold,
                scope,
            } => match scope {
                DisableScope::Forever => write!(
                    f,
                    "lastStars={last_stars} >= disableAfterStars={threshold}: disabled forever"
                ),
                DisableScope::Session => write!(
                    f,
                    "lastStars={last_stars} >= disableAfterStars={threshold}: disabled for this session"
                ),
            },
            DenyReason::MinInterval {
                elapsed_ms,
                min_interval_ms,
                scope,
            } => write!(
                f,
                "{scope} interval not reached: elapsed={elapsed_ms}ms < minIntervalMillis={min_interval_ms}"
            ),
            DenyReason::SessionInterval {
                session_count,
                session_interval,
                remainder,
            } => write!(
                f,
                "session={session_count}: sessionInterval={session_interval}, remainder={remainder}"
            ),
            DenyReason::MinSessions {
                session_count,
                min_sessions,
            } => write!(f, "sessionCount={session_count} < minSessions={min_sessions}"),
            DenyReason::MaxTotalShows {
                total_shows,
                max_total_shows,
            } => write!(
                f,
                "totalShowCount={total_shows} >= maxTotalShows={max_total_shows}"
            ),
            DenyReason::MaxShowsPerSession {
                shows_this_session,
                max_shows_per_session,
            } => write!(
                f,
                "showCountThisSession={shows_this_session} >= maxShowsPerSession={max_shows_per_session}"
            ),
        }
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allow: bool,
    /// The force-show predicate short-circuited evaluation.
    pub forced: bool,
    pub reasons: Vec<DenyReason>,
}

impl Decision {
    pub(crate) fn forced() -> Self {
        Self {
            allow: true,
            forced: true,
            reasons: Vec::new(),
        }
    }

    pub(crate) fn from_reasons(reasons: Vec<DenyReason>) -> Self {
        Self {
            allow: reasons.is_empty(),
            forced: false,
            reasons,
        }
    }

    /// Human-readable reasons, in evaluation order.
    pub fn reason_messages(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}

/// Decide whether a prompt may be shown.
///
/// Pure: reads only its arguments and may be called any number of times.
/// The disable and interval scopes come from the persisted snapshot, not
/// from `config`, since a previous session may have set them.
pub fn evaluate(config: &PolicyConfig, state: &StateSnapshot, now: DateTime<Utc>) -> Decision {
    if let Some(force) = config.force_show() {
        if force(state) {
            tracing::debug!("force-show predicate matched, skipping all checks");
            return Decision::forced();
        }
    }

    let policy = config.settings();
    let now_ms = now.timestamp_millis();

    tracing::debug!(
        session_count = state.session_count,
        min_sessions = policy.min_sessions,
        session_interval = policy.session_interval,
        shows_this_session = state.show_count_this_session,
        max_shows_per_session = policy.max_shows_per_session,
        "session conditions"
    );
    tracing::debug!(
        total_shows = state.total_show_count,
        max_total_shows = policy.max_total_shows,
        last_show_ms = state.last_show_time_ms,
        min_interval_ms = policy.min_interval_millis,
        interval_scope = %state.interval_scope,
        "global conditions"
    );
    tracing::debug!(
        last_stars = state.last_stars,
        disable_after_stars = policy.disable_after_stars,
        disable_scope = %state.disable_scope,
        "rating conditions"
    );

    let mut reasons = Vec::new();

    if let Some(veto) = config.custom_veto() {
        if !veto(state) {
            reasons.push(DenyReason::CustomVeto);
        }
    }

    if policy.disable_after_stars > 0 && state.last_stars >= policy.disable_after_stars {
        reasons.push(DenyReason::DisabledAfterStars {
            last_stars: state.last_stars,
            threshold: policy.disable_after_stars,
            scope: state.disable_scope,
        });
    }

    if policy.min_interval_millis > 0 && state.last_show_time_ms > 0 {
        let elapsed_ms = now_ms.saturating_sub(state.last_show_time_ms);
        if elapsed_ms < policy.min_interval_millis {
            reasons.push(DenyReason::MinInterval {
                elapsed_ms,
                min_interval_ms: policy.min_interval_millis,
                scope: state.interval_scope,
            });
        }
    }

    if policy.session_interval > 0 {
        let period = i64::from(policy.session_interval) + 1;
        let remainder = i64::from(state.session_count) % period;
        if remainder != 0 {
            reasons.push(DenyReason::SessionInterval {
                session_count: state.session_count,
                session_interval: policy.session_interval,
                remainder,
            });
        }
    }

    if state.session_count < policy.min_sessions {
        reasons.push(DenyReason::MinSessions {
            session_count: state.session_count,
            min_sessions: policy.min_sessions,
        });
    }

    if policy.max_total_shows > 0 && state.total_show_count >= policy.max_total_shows {
        reasons.push(DenyReason::MaxTotalShows {
            total_shows: state.total_show_count,
            max_total_shows: policy.max_total_shows,
        });
    }

    if policy.max_shows_per_session > 0
        && state.show_count_this_session >= policy.max_shows_per_session
    {
        reasons.push(DenyReason::MaxShowsPerSession {
            shows_this_session: state.show_count_this_session,
            max_shows_per_session: policy.max_shows_per_session,
        });
    }

    let decision = Decision::from_reasons(reasons);
    if decision.allow {
        tracing::debug!("decision: show");
    } else {
        for (i, reason) in decision.reasons.iter().enumerate() {
            tracing::debug!(index = i, code = reason.code(), "{reason}");
        }
        tracing::debug!(denied_by = decision.reasons.len(), "decision: skip");
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::tests::test_app;
    use crate::policy::PolicySettings;
    use chrono::TimeZone;

    fn config(settings: PolicySettings) -> PolicyConfig {
        PolicyConfig::new(test_app(), settings, vec![]).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn state(session_count: i32) -> StateSnapshot {
        StateSnapshot {
            session_count,
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn permissive_policy_allows_fresh_state() {
        let d = evaluate(&config(PolicySettings::permissive()), &state(0), now());
        assert!(d.allow);
        assert!(!d.forced);
        assert!(d.reasons.is_empty());
    }

    #[test]
    fn force_show_bypasses_everything() {
        let settings = PolicySettings {
            disable_after_stars: 1,
            min_sessions: 3,
            ..PolicySettings::default()
        };
        let cfg = config(settings)
            .with_custom_veto(|_| false)
            .with_force_show(|_| true);
        let snapshot = StateSnapshot {
            session_count: -1,
            last_stars: 5,
            ..StateSnapshot::default()
        };
        let d = evaluate(&cfg, &snapshot, now());
        assert!(d.allow);
        assert!(d.forced);
        assert!(d.reasons.is_empty());
    }

    #[test]
    fn force_show_returning_false_falls_through() {
        let cfg = config(PolicySettings::default()).with_force_show(|_| false);
        let d = evaluate(&cfg, &state(0), now());
        assert!(!d.allow);
        assert!(!d.forced);
    }

    #[test]
    fn custom_veto_is_reported_first() {
        let settings = PolicySettings {
            min_sessions: 5,
            ..PolicySettings::permissive()
        };
        let cfg = config(settings).with_custom_veto(|s| !s.is_rated);
        let snapshot = StateSnapshot {
            is_rated: true,
            ..state(0)
        };
        let d = evaluate(&cfg, &snapshot, now());
        assert_eq!(d.reasons[0], DenyReason::CustomVeto);
        assert_eq!(d.reasons[1].code(), "min-sessions");
        assert_eq!(d.reason_messages()[0], "custom-veto");
    }

    #[test]
    fn stars_reason_uses_persisted_scope() {
        let settings = PolicySettings {
            disable_after_stars: 4,
            disable_scope: DisableScope::Session,
            ..PolicySettings::permissive()
        };
        let snapshot = StateSnapshot {
            last_stars: 4,
            disable_scope: DisableScope::Forever,
            ..state(10)
        };
        let d = evaluate(&config(settings), &snapshot, now());
        assert_eq!(
            d.reasons,
            vec![DenyReason::DisabledAfterStars {
                last_stars: 4,
                threshold: 4,
                scope: DisableScope::Forever,
            }]
        );
        assert!(d.reason_messages()[0].contains("forever"));
    }

    #[test]
    fn interval_only_applies_after_first_show() {
        let settings = PolicySettings {
            min_interval_millis: 5_000,
            ..PolicySettings::permissive()
        };
        let cfg = config(settings);
        assert!(evaluate(&cfg, &state(1), now()).allow);

        let recent = StateSnapshot {
            last_show_time_ms: now().timestamp_millis() - 4_999,
            interval_scope: IntervalScope::Global,
            ..state(1)
        };
        let d = evaluate(&cfg, &recent, now());
        assert_eq!(
            d.reasons,
            vec![DenyReason::MinInterval {
                elapsed_ms: 4_999,
                min_interval_ms: 5_000,
                scope: IntervalScope::Global,
            }]
        );
        assert!(d.reason_messages()[0].starts_with("GLOBAL interval"));

        let elapsed = StateSnapshot {
            last_show_time_ms: now().timestamp_millis() - 5_000,
            ..state(1)
        };
        assert!(evaluate(&cfg, &elapsed, now()).allow);
    }

    #[test]
    fn session_interval_uses_modulo_of_interval_plus_one() {
        let settings = PolicySettings {
            session_interval: 2,
            ..PolicySettings::permissive()
        };
        let cfg = config(settings);
        let allowed: Vec<i32> = (0..6)
            .filter(|&n| evaluate(&cfg, &state(n), now()).allow)
            .collect();
        assert_eq!(allowed, vec![0, 3]);
    }

    #[test]
    fn session_interval_at_i32_max_does_not_overflow() {
        let settings = PolicySettings {
            session_interval: i32::MAX,
            ..PolicySettings::permissive()
        };
        let cfg = config(settings);
        assert!(evaluate(&cfg, &state(0), now()).allow);

        let d = evaluate(&cfg, &state(3), now());
        assert_eq!(
            d.reasons,
            vec![DenyReason::SessionInterval {
                session_count: 3,
                session_interval: i32::MAX,
                remainder: 3,
            }]
        );

        let d = evaluate(&cfg, &state(i32::MAX), now());
        assert_eq!(d.reasons[0].code(), "session-interval");
    }

    #[test]
    fn uninitialized_session_fails_periodicity() {
        let settings = PolicySettings {
            session_interval: 1,
            ..PolicySettings::permissive()
        };
        let d = evaluate(&config(settings), &state(-1), now());
        assert_eq!(d.reasons[0].code(), "session-interval");
    }

    #[test]
    fn caps_report_in_order() {
        let settings = PolicySettings {
            max_total_shows: 3,
            max_shows_per_session: 1,
            ..PolicySettings::permissive()
        };
        let snapshot = StateSnapshot {
            total_show_count: 3,
            show_count_this_session: 1,
            ..state(2)
        };
        let d = evaluate(&config(settings), &snapshot, now());
        let codes: Vec<_> = d.reasons.iter().map(DenyReason::code).collect();
        assert_eq!(codes, vec!["max-total-shows", "max-shows-per-session"]);
    }

    #[test]
    fn all_checks_accumulate() {
        let settings = PolicySettings {
            min_sessions: 2,
            session_interval: 1,
            max_shows_per_session: 1,
            min_interval_millis: 60_000,
            max_total_shows: 1,
            disable_after_stars: 3,
            ..PolicySettings::permissive()
        };
        let cfg = config(settings).with_custom_veto(|_| false);
        let snapshot = StateSnapshot {
            session_count: 1,
            last_show_time_ms: now().timestamp_millis() - 1,
            total_show_count: 1,
            show_count_this_session: 1,
            last_stars: 3,
            ..StateSnapshot::default()
        };
        let d = evaluate(&cfg, &snapshot, now());
        let codes: Vec<_> = d.reasons.iter().map(DenyReason::code).collect();
        assert_eq!(
            codes,
            vec![
                "custom-veto",
                "disabled-after-stars",
                "min-interval",
                "session-interval",
                "min-sessions",
                "max-total-shows",
                "max-shows-per-session",
            ]
        );
    }

    #[test]
    fn decision_serializes_with_codes() {
        let d = Decision::from_reasons(vec![DenyReason::MinSessions {
            session_count: 0,
            min_sessions: 1,
        }]);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["allow"], false);
        assert_eq!(json["reasons"][0]["code"], "min-sessions");
        assert_eq!(json["reasons"][0]["min_sessions"], 1);
    }
}
