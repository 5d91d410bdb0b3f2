//! Persisted prompt state commands.
//!
//! None of these count as an app session: `show` and `check` only read,
//! and `reset` leaves the session counter at 0.

use chrono::Utc;
use clap::Subcommand;
use rategate_core::{evaluate, PromptController};

#[derive(Subcommand)]
pub enum StateAction {
    /// Print every persisted value
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate the policy against the stored state
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Erase all persisted state and start a fresh session
    Reset,
}

pub fn run(action: StateAction) -> Result<(), Box<dyn std::error::Error>> {
    let (config, policy, store) = super::open()?;

    match action {
        StateAction::Show { json } => {
            let snapshot = store.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("session_count:        {}", snapshot.session_count);
                println!("last_show_time:       {}", snapshot.last_show_time_ms);
                println!("total_show_count:     {}", snapshot.total_show_count);
                println!("show_this_session:    {}", snapshot.show_count_this_session);
                println!("last_stars:           {}", snapshot.last_stars);
                println!("disable_this_session: {}", snapshot.disabled_this_session);
                println!("disable_type:         {}", snapshot.disable_scope);
                println!("interval_type:        {}", snapshot.interval_scope);
                println!("is_rated:             {}", snapshot.is_rated);
            }
        }
        StateAction::Check { json } => {
            let decision = evaluate(&policy, &store.snapshot(), Utc::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else if decision.allow {
                println!("show");
            } else {
                println!("skip");
                for reason in &decision.reasons {
                    println!("  - {reason}");
                }
            }
        }
        StateAction::Reset => {
            let mut controller = PromptController::new(store);
            controller.initialize(policy, config.enabled)?;
            controller.reset()?;
            println!(
                "prompt state reset (session {})",
                controller.store().session_count()
            );
        }
    }
    Ok(())
}
