//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - Streak: never decremented by a backwards date, +1 on the next day
//! - Ledger: XP monotonic, longest_streak >= current_streak after every update
//! - Badges: an owned badge is never awarded again

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use tracker_core::accrual::{plan_badges, ProgressLedger};
use tracker_core::badges::{evaluate, BadgeRequirement, UserStats};
use tracker_core::models::{Badge, BadgeCategory};
use tracker_core::streak::next_streak;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn badge_catalog() -> Vec<Badge> {
    let defs = [
        ("first_steps", BadgeRequirement::TopicsCompleted(1), 10),
        ("ten_topics", BadgeRequirement::TopicsCompleted(10), 50),
        ("on_fire", BadgeRequirement::StreakDays(3), 25),
        ("week_warrior", BadgeRequirement::StreakDays(7), 75),
        ("finisher", BadgeRequirement::RoadmapsCompleted(1), 100),
        ("xp_hunter", BadgeRequirement::TotalXp(1_000), 100),
    ];
    defs.iter()
        .map(|(id, requirement, xp)| Badge {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            icon: "award".into(),
            category: BadgeCategory::Milestone,
            requirement: *requirement,
            xp_reward: *xp,
        })
        .collect()
}

// ============================================================
// Streak Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_backwards_date_never_decrements(current in 0u32..10_000, back in 1i64..400) {
        let last = epoch() + Duration::days(400);
        let today = last - Duration::days(back);
        let (streak, _) = next_streak(Some(last), today, current);
        prop_assert_eq!(streak, current);
    }

    #[test]
    fn prop_next_day_increments(current in 0u32..10_000, offset in 0i64..3_000) {
        let last = epoch() + Duration::days(offset);
        let (streak, _) = next_streak(Some(last), last + Duration::days(1), current);
        prop_assert_eq!(streak, current + 1);
    }

    #[test]
    fn prop_gap_resets_to_one(current in 0u32..10_000, gap in 2i64..1_000) {
        let last = epoch();
        let (streak, _) = next_streak(Some(last), last + Duration::days(gap), current);
        prop_assert_eq!(streak, 1);
    }
}

// ============================================================
// Ledger Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_ledger_invariants_hold_for_any_sequence(
        steps in prop::collection::vec((-3i64..5, 1u32..200), 1..60)
    ) {
        let mut ledger = ProgressLedger::default();
        let mut day = epoch() + Duration::days(100);
        let mut prev_xp = 0u64;
        let mut prev_longest = 0u32;

        for (delta_days, xp) in steps {
            day += Duration::days(delta_days);
            ledger.record_completion(xp, day);

            prop_assert!(ledger.xp_points() >= prev_xp, "XP decreased");
            prop_assert_eq!(ledger.xp_points(), prev_xp + u64::from(xp));
            prop_assert!(ledger.longest_streak() >= prev_longest, "longest streak decreased");
            prop_assert!(ledger.longest_streak() >= ledger.current_streak());
            prop_assert!(ledger.current_streak() >= 1);

            prev_xp = ledger.xp_points();
            prev_longest = ledger.longest_streak();
        }
    }
}

// ============================================================
// Badge Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_badges_award_once(
        xp in 0u64..20_000,
        streak in 0u32..60,
        topics in 0u64..200,
        roadmaps in 0u64..5,
        passes in 1usize..6,
    ) {
        let catalog = badge_catalog();
        let mut owned: HashSet<String> = HashSet::new();
        let mut ledger = ProgressLedger::restore(xp, streak, streak, None);
        let mut awarded_total = 0usize;
        let mut bonus_total = 0u64;

        for _ in 0..passes {
            let (next, eval) = plan_badges(ledger, topics, roadmaps, &catalog, &owned);
            for award in &eval.awards {
                prop_assert!(owned.insert(award.badge_id.clone()), "badge awarded twice");
            }
            awarded_total += eval.awards.len();
            bonus_total += eval.bonus_xp;
            ledger = next;
        }

        prop_assert!(awarded_total <= catalog.len());
        prop_assert_eq!(ledger.xp_points(), xp + bonus_total);
    }

    #[test]
    fn prop_evaluation_is_threshold_exact(topics in 0u64..30) {
        let catalog = badge_catalog();
        let stats = UserStats { topics_completed: topics, ..Default::default() };
        let eval = evaluate(&catalog, &HashSet::new(), &stats);
        let has_ten = eval.awards.iter().any(|a| a.badge_id == "ten_topics");
        prop_assert_eq!(has_ten, topics >= 10);
    }
}
