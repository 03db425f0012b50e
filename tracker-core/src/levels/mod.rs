//! XP levels
//!
//! Ten named levels on fixed XP thresholds. Level 10 is terminal.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpLevel {
    pub level: u32,
    pub name: &'static str,
    pub min_xp: u64,
}

pub const LEVELS: [XpLevel; 10] = [
    XpLevel { level: 1, name: "Beginner", min_xp: 0 },
    XpLevel { level: 2, name: "Learner", min_xp: 100 },
    XpLevel { level: 3, name: "Student", min_xp: 300 },
    XpLevel { level: 4, name: "Scholar", min_xp: 600 },
    XpLevel { level: 5, name: "Apprentice", min_xp: 1_000 },
    XpLevel { level: 6, name: "Practitioner", min_xp: 1_500 },
    XpLevel { level: 7, name: "Expert", min_xp: 2_500 },
    XpLevel { level: 8, name: "Master", min_xp: 4_000 },
    XpLevel { level: 9, name: "Grandmaster", min_xp: 6_000 },
    XpLevel { level: 10, name: "Legend", min_xp: 10_000 },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub name: &'static str,
    pub total_xp: u64,
    pub xp_into_level: u64,
    /// XP span of the current level; `None` at the top level
    pub xp_for_next: Option<u64>,
    pub next_level_name: Option<&'static str>,
    pub percent_to_next: u8,
}

pub fn level_for(xp: u64) -> XpLevel {
    LEVELS
        .iter()
        .rev()
        .find(|l| xp >= l.min_xp)
        .copied()
        .unwrap_or(LEVELS[0])
}

pub fn level_progress(xp: u64) -> LevelProgress {
    let current = level_for(xp);
    let next = LEVELS.iter().find(|l| l.level == current.level + 1);
    let xp_into_level = xp - current.min_xp;

    match next {
        Some(next) => {
            let span = next.min_xp - current.min_xp;
            LevelProgress {
                level: current.level,
                name: current.name,
                total_xp: xp,
                xp_into_level,
                xp_for_next: Some(span),
                next_level_name: Some(next.name),
                percent_to_next: ((xp_into_level * 100 + span / 2) / span).min(100) as u8,
            }
        }
        None => LevelProgress {
            level: current.level,
            name: current.name,
            total_xp: xp,
            xp_into_level,
            xp_for_next: None,
            next_level_name: None,
            percent_to_next: 100,
        },
    }
}
