//! What happens after a request or a rating.

use serde::Serialize;

use super::presenter::PresentError;
use crate::policy::{Decision, PolicyConfig};

/// Result of a show request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutcome {
    /// The presenter began rendering. `recorded` is false when the show
    /// could not be written to the store.
    Shown { recorded: bool },
    Skipped(SkipReason),
    /// The presenter failed; nothing was recorded.
    Failed(PresentError),
}

impl ShowOutcome {
    pub fn is_shown(&self) -> bool {
        matches!(self, ShowOutcome::Shown { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotInitialized,
    /// Consumed the one-shot dismiss-next flag.
    DismissedNext,
    /// The policy denied the show.
    Denied(Decision),
}

/// Where to send the user after a rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "kebab-case")]
pub enum RatingRoute {
    /// The rating is not final yet.
    Pending,
    /// Low rating: open the feedback prompt right away, bypassing the
    /// policy (`force_immediate = true`).
    Feedback,
    /// Start the platform's in-app review flow.
    InAppReview,
    /// Open the store listing.
    StoreListing { url: String },
    /// Nothing further; close the prompt.
    Close,
}

impl RatingRoute {
    /// Route a final rating of `stars`.
    pub fn for_rating(config: &PolicyConfig, stars: i32) -> Self {
        let policy = config.settings();
        if stars <= policy.max_stars_for_feedback {
            RatingRoute::Feedback
        } else if stars <= policy.review_max_stars {
            if policy.disable_in_app_review {
                RatingRoute::StoreListing {
                    url: config.store_url().to_string(),
                }
            } else {
                RatingRoute::InAppReview
            }
        } else {
            RatingRoute::Close
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::tests::test_app;
    use crate::policy::PolicySettings;

    fn config(max_feedback: i32, review_max: i32, disable_in_app: bool) -> PolicyConfig {
        let settings = PolicySettings {
            max_stars_for_feedback: max_feedback,
            review_max_stars: review_max,
            disable_in_app_review: disable_in_app,
            ..PolicySettings::default()
        };
        PolicyConfig::new(test_app(), settings, vec![]).unwrap()
    }

    #[test]
    fn low_ratings_go_to_feedback() {
        let cfg = config(3, 5, false);
        assert_eq!(RatingRoute::for_rating(&cfg, 1), RatingRoute::Feedback);
        assert_eq!(RatingRoute::for_rating(&cfg, 3), RatingRoute::Feedback);
        assert_eq!(RatingRoute::for_rating(&cfg, 4), RatingRoute::InAppReview);
        assert_eq!(RatingRoute::for_rating(&cfg, 5), RatingRoute::InAppReview);
    }

    #[test]
    fn store_listing_when_in_app_review_disabled() {
        let cfg = config(2, 5, true);
        assert_eq!(
            RatingRoute::for_rating(&cfg, 5),
            RatingRoute::StoreListing {
                url: "https://play.google.com/store/apps/details?id=com.example.app".into()
            }
        );
    }

    #[test]
    fn ratings_above_review_cut_just_close() {
        let cfg = config(2, 4, false);
        assert_eq!(RatingRoute::for_rating(&cfg, 5), RatingRoute::Close);
    }

    #[test]
    fn route_serializes_with_tag() {
        let json = serde_json::to_value(RatingRoute::InAppReview).unwrap();
        assert_eq!(json["route"], "in-app-review");
    }
}
