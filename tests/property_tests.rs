/// Property-based tests using proptest
/// Tests invariants of the weekly summary aggregation
use chrono::Utc;
use proptest::prelude::*;
use survey_weekly_digest::insights::{completion_rate, Insights};
use survey_weekly_digest::models::{Display, DisplayStatus, Survey, SurveyResponse, SurveyStatus};

fn survey(displays: usize, finished: usize, partial: usize) -> Survey {
    Survey {
        id: "s".to_string(),
        name: "s".to_string(),
        status: SurveyStatus::InProgress,
        questions: Vec::new(),
        responses: (0..finished + partial)
            .map(|i| SurveyResponse {
                id: i.to_string(),
                created_at: Utc::now(),
                finished: i < finished,
                data: serde_json::Map::new(),
            })
            .collect(),
        displays: (0..displays)
            .map(|_| Display {
                status: DisplayStatus::Seen,
            })
            .collect(),
    }
}

// Property: the rate after survey i only depends on the running totals up to i
proptest! {
    #[test]
    fn completion_rate_tracks_running_totals(
        counts in proptest::collection::vec((0usize..20, 0usize..20, 0usize..5), 1..8)
    ) {
        let mut insights = Insights::default();
        let mut finished_sum = 0u64;
        let mut display_sum = 0u64;

        for (displays, finished, partial) in counts {
            insights.fold_survey(&survey(displays, finished, partial));
            finished_sum += finished as u64;
            display_sum += displays as u64;

            if display_sum == 0 {
                prop_assert!(!insights.completion_rate.is_finite());
            } else {
                let expected = (100.0 * finished_sum as f64 / display_sum as f64).round();
                prop_assert_eq!(insights.completion_rate, expected);
            }
        }
        prop_assert_eq!(insights.total_completed_responses, finished_sum);
        prop_assert_eq!(insights.total_displays, display_sum);
    }

    #[test]
    fn completion_rate_is_a_whole_number(completed in 0u64..10_000, displays in 1u64..10_000) {
        let rate = completion_rate(completed, displays);
        prop_assert!(rate.is_finite());
        prop_assert_eq!(rate.fract(), 0.0);
        prop_assert!(rate >= 0.0);
    }
}
