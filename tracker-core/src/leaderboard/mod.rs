//! Public leaderboard
//!
//! Computed on read: public profiles ordered by XP descending, ties broken
//! by user id ascending, ranked by position.

use serde::{Deserialize, Serialize};

use crate::models::{Profile, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub xp_points: u64,
    /// Hidden when the learner opted out of showing their streak
    pub current_streak: Option<u32>,
}

pub fn rank_profiles<'a, I>(profiles: I, limit: usize) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = &'a Profile>,
{
    let mut public: Vec<&Profile> = profiles.into_iter().filter(|p| p.is_public).collect();
    public.sort_by(|a, b| {
        b.ledger
            .xp_points()
            .cmp(&a.ledger.xp_points())
            .then(a.id.cmp(&b.id))
    });

    public
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i as u32 + 1,
            user_id: p.id,
            username: p.username.clone(),
            display_name: p.display_name.clone(),
            xp_points: p.ledger.xp_points(),
            current_streak: p.show_streak.then(|| p.ledger.current_streak()),
        })
        .collect()
}
