use clap::{Subcommand, ValueEnum};
use rategate_core::{
    PresentError, PromptController, PromptKind, PromptListener, RatingRoute, ShowOutcome,
    SkipReason, StoreError,
};

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Rating,
    Feedback,
}

impl From<KindArg> for PromptKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Rating => PromptKind::Rating,
            KindArg::Feedback => PromptKind::Feedback,
        }
    }
}

#[derive(Subcommand)]
pub enum PromptAction {
    /// Start a session and request a prompt
    Show {
        /// Prompt to request
        #[arg(long, value_enum, default_value = "rating")]
        kind: KindArg,
        /// Skip the policy check
        #[arg(long)]
        now: bool,
        /// Arm the one-shot dismiss before requesting
        #[arg(long)]
        dismiss_next: bool,
        /// Submit this star rating if the rating prompt is shown
        #[arg(long)]
        stars: Option<i32>,
        /// Feedback reason id to submit when the rating routes to feedback
        #[arg(long)]
        reason: Option<String>,
        /// Feedback text
        #[arg(long, default_value = "")]
        text: String,
    },
    /// Start a session and print whether a prompt would be shown
    Session,
}

/// Prints every controller event to stdout.
struct ConsoleListener;

impl PromptListener for ConsoleListener {
    fn on_rating_changed(&mut self, stars: i32, is_final: bool) {
        if is_final {
            println!("event: rated {stars}");
        }
    }

    fn on_feedback_changed(&mut self, reason: &str, text: &str, is_final: bool) {
        if is_final {
            println!("event: feedback \"{reason}\" {text}");
        }
    }

    fn on_prompt_shown(&mut self, kind: PromptKind) {
        println!("event: shown {kind}");
    }

    fn on_prompt_failed(&mut self, kind: PromptKind, error: &PresentError) {
        println!("event: {kind} failed: {error}");
    }

    fn on_store_error(&mut self, error: &StoreError) {
        println!("event: store error: {error}");
    }
}

fn console_presenter(kind: PromptKind) -> Result<(), PresentError> {
    println!("prompt: {kind}");
    Ok(())
}

fn print_outcome(outcome: &ShowOutcome) {
    match outcome {
        ShowOutcome::Shown { recorded: true } => println!("shown"),
        ShowOutcome::Shown { recorded: false } => println!("shown (not recorded)"),
        ShowOutcome::Skipped(SkipReason::NotInitialized) => println!("skipped: disabled"),
        ShowOutcome::Skipped(SkipReason::DismissedNext) => println!("skipped: dismissed-next"),
        ShowOutcome::Skipped(SkipReason::Denied(decision)) => {
            println!("skipped: denied");
            for reason in &decision.reasons {
                println!("  - {}: {reason}", reason.code());
            }
        }
        ShowOutcome::Failed(e) => println!("failed: {e}"),
    }
}

pub fn run(action: PromptAction) -> Result<(), Box<dyn std::error::Error>> {
    let (config, policy, store) = super::open()?;
    tracing::debug!(namespace = %config.namespace, enabled = config.enabled, "starting session");
    let mut controller = PromptController::new(store).with_listener(ConsoleListener);
    controller.initialize(policy, config.enabled)?;
    if controller.is_initialized() {
        println!("session: {}", controller.store().session_count());
    }

    match action {
        PromptAction::Session => match controller.can_show(chrono::Utc::now()) {
            Some(decision) if decision.allow => println!("would show"),
            Some(decision) => {
                println!("would skip");
                for reason in &decision.reasons {
                    println!("  - {}: {reason}", reason.code());
                }
            }
            None => println!("disabled"),
        },
        PromptAction::Show {
            kind,
            now,
            dismiss_next,
            stars,
            reason,
            text,
        } => {
            if dismiss_next {
                controller.arm_dismiss_next();
            }
            let kind = PromptKind::from(kind);
            let mut presenter = console_presenter;
            let outcome = controller.request_show(kind, now, &mut presenter);
            print_outcome(&outcome);

            let Some(stars) = stars else {
                return Ok(());
            };
            if !outcome.is_shown() || kind != PromptKind::Rating {
                return Ok(());
            }

            let route = controller.report_outcome(stars, true)?;
            match &route {
                RatingRoute::StoreListing { url } => println!("route: store-listing {url}"),
                RatingRoute::Feedback => println!("route: feedback"),
                RatingRoute::InAppReview => println!("route: in-app-review"),
                RatingRoute::Close => println!("route: close"),
                RatingRoute::Pending => println!("route: pending"),
            }

            if route == RatingRoute::Feedback {
                let outcome = controller.request_show(PromptKind::Feedback, true, &mut presenter);
                print_outcome(&outcome);
                match reason {
                    Some(id) => controller.report_feedback(&id, &text, true)?,
                    None => controller.report_dismissed(PromptKind::Feedback),
                }
            } else {
                controller.report_dismissed(PromptKind::Rating);
            }
        }
    }
    Ok(())
}
