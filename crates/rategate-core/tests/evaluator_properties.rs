//! Property-based tests for the policy evaluator.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rategate_core::{
    evaluate, AppIdentity, DisableScope, IntervalScope, PolicyConfig, PolicySettings,
    StateSnapshot,
};

fn app() -> AppIdentity {
    AppIdentity {
        app_name: "Rate Example".into(),
        package_id: "com.example.app".into(),
        support_email: "support@example.com".into(),
        ..AppIdentity::default()
    }
}

fn scope_strategy() -> impl Strategy<Value = (DisableScope, IntervalScope)> {
    (any::<bool>(), any::<bool>()).prop_map(|(d, i)| {
        (
            if d { DisableScope::Forever } else { DisableScope::Session },
            if i { IntervalScope::Global } else { IntervalScope::Session },
        )
    })
}

prop_compose! {
    fn snapshot_strategy()(
        session_count in -1i32..50,
        last_show_time_ms in 0i64..2_000_000_000_000,
        total_show_count in 0i32..20,
        show_count_this_session in 0i32..5,
        last_stars in 0i32..=5,
        disabled_this_session in any::<bool>(),
        scopes in scope_strategy(),
        is_rated in any::<bool>(),
    ) -> StateSnapshot {
        StateSnapshot {
            session_count,
            last_show_time_ms,
            total_show_count,
            show_count_this_session,
            last_stars,
            disabled_this_session,
            disable_scope: scopes.0,
            interval_scope: scopes.1,
            is_rated,
        }
    }
}

prop_compose! {
    fn settings_strategy()(
        min_sessions in 0i32..10,
        session_interval in 0i32..5,
        max_shows_per_session in 0i32..4,
        min_interval_millis in 0i64..100_000,
        max_total_shows in 0i32..10,
        disable_after_stars in 0i32..=5,
    ) -> PolicySettings {
        PolicySettings {
            min_sessions,
            session_interval,
            max_shows_per_session,
            min_interval_millis,
            max_total_shows,
            disable_after_stars,
            ..PolicySettings::default()
        }
    }
}

proptest! {
    #[test]
    fn force_show_always_allows(
        settings in settings_strategy(),
        state in snapshot_strategy(),
        now_ms in 0i64..2_000_000_000_000,
    ) {
        let config = PolicyConfig::new(app(), settings, vec![])
            .unwrap()
            .with_custom_veto(|_| false)
            .with_force_show(|_| true);
        let now = Utc.timestamp_millis_opt(now_ms).unwrap();
        let decision = evaluate(&config, &state, now);
        prop_assert!(decision.allow);
        prop_assert!(decision.forced);
        prop_assert!(decision.reasons.is_empty());
    }

    #[test]
    fn evaluation_is_repeatable(
        settings in settings_strategy(),
        state in snapshot_strategy(),
        now_ms in 0i64..2_000_000_000_000,
    ) {
        let config = PolicyConfig::new(app(), settings, vec![]).unwrap();
        let now = Utc.timestamp_millis_opt(now_ms).unwrap();
        let first = evaluate(&config, &state, now);
        let second = evaluate(&config, &state, now);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.allow, first.reasons.is_empty());
    }

    #[test]
    fn forever_disable_denies_regardless_of_other_state(
        settings in settings_strategy(),
        state in snapshot_strategy(),
        threshold in 1i32..=5,
        now_ms in 0i64..2_000_000_000_000,
    ) {
        let settings = PolicySettings { disable_after_stars: threshold, ..settings };
        let state = StateSnapshot {
            last_stars: threshold,
            disable_scope: DisableScope::Forever,
            ..state
        };
        let config = PolicyConfig::new(app(), settings, vec![]).unwrap();
        let decision = evaluate(&config, &state, Utc.timestamp_millis_opt(now_ms).unwrap());
        prop_assert!(!decision.allow);
        prop_assert!(decision.reasons.iter().any(|r| r.code() == "disabled-after-stars"));
    }

    #[test]
    fn session_interval_passes_only_on_multiples(
        session_count in 0i32..500,
        session_interval in 1i32..20,
    ) {
        let settings = PolicySettings {
            session_interval,
            ..PolicySettings::permissive()
        };
        let config = PolicyConfig::new(app(), settings, vec![]).unwrap();
        let state = StateSnapshot { session_count, ..StateSnapshot::default() };
        let decision = evaluate(&config, &state, Utc::now());
        prop_assert_eq!(decision.allow, session_count % (session_interval + 1) == 0);
    }
}
