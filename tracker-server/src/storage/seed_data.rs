//! Seed Data - Official roadmaps and the default badge set
//!
//! Populates the LMDB catalog with starter curricula and badge definitions.
//! Re-seeding overwrites by id, so it is safe to run at every start-up.

use super::lmdb_catalog::{CatalogStoreError, LmdbCatalogStore};
use tracing::info;
use tracker_core::badges::BadgeRequirement;
use tracker_core::models::{Badge, BadgeCategory, Difficulty, Roadmap, Section, Topic};

/// Seed every catalog database, then recompute `total_topics`
pub fn seed_all(store: &LmdbCatalogStore) -> Result<(), CatalogStoreError> {
    let mut total = 0;
    total += seed_roadmaps(store)?;
    total += seed_badges(store)?;
    store.recount_topics()?;

    info!("Seeded {} total catalog entries", total);
    Ok(())
}

// ============================================================================
// Roadmaps
// ============================================================================

/// (section title, [(topic title, xp_reward, estimated_minutes)])
type SectionDef = (&'static str, &'static [(&'static str, u32, u32)]);

struct RoadmapDef {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    category: &'static str,
    difficulty: Difficulty,
    hours: u32,
    sections: &'static [SectionDef],
}

const ROADMAPS: &[RoadmapDef] = &[
    RoadmapDef {
        id: "dsa",
        title: "Data Structures & Algorithms",
        description: "Master the fundamentals to ace coding interviews",
        category: "computer-science",
        difficulty: Difficulty::Intermediate,
        hours: 120,
        sections: &[
            ("Foundations", &[
                ("Big-O Notation", 10, 30),
                ("Arrays & Strings", 10, 45),
                ("Hash Maps", 15, 45),
            ]),
            ("Linear Structures", &[
                ("Linked Lists", 15, 60),
                ("Stacks & Queues", 15, 45),
            ]),
            ("Trees & Graphs", &[
                ("Binary Trees", 20, 60),
                ("Heaps", 20, 45),
                ("Graph Traversal", 25, 90),
            ]),
        ],
    },
    RoadmapDef {
        id: "ai",
        title: "Artificial Intelligence & ML",
        description: "From basics to neural networks and real-world applications",
        category: "ai",
        difficulty: Difficulty::Advanced,
        hours: 200,
        sections: &[
            ("Math Essentials", &[
                ("Linear Algebra", 15, 90),
                ("Probability", 15, 90),
            ]),
            ("Classical ML", &[
                ("Linear Regression", 20, 60),
                ("Decision Trees", 20, 60),
                ("Model Evaluation", 20, 45),
            ]),
            ("Deep Learning", &[
                ("Neural Networks", 25, 120),
                ("Backpropagation", 25, 90),
            ]),
        ],
    },
    RoadmapDef {
        id: "security",
        title: "Cybersecurity Fundamentals",
        description: "Protect systems and networks with essential security skills",
        category: "security",
        difficulty: Difficulty::Beginner,
        hours: 100,
        sections: &[
            ("Core Concepts", &[
                ("CIA Triad", 10, 30),
                ("Threat Modeling", 15, 45),
            ]),
            ("Network Security", &[
                ("TCP/IP Basics", 15, 60),
                ("Firewalls", 15, 45),
                ("TLS", 20, 60),
            ]),
        ],
    },
    RoadmapDef {
        id: "webdev",
        title: "Web Development",
        description: "Full-stack development from HTML to React and Node.js",
        category: "web",
        difficulty: Difficulty::Beginner,
        hours: 150,
        sections: &[
            ("Frontend Basics", &[
                ("HTML", 10, 45),
                ("CSS", 10, 60),
                ("JavaScript", 15, 90),
            ]),
            ("Frameworks", &[
                ("React Components", 20, 90),
                ("State Management", 20, 60),
            ]),
            ("Backend", &[
                ("HTTP APIs", 20, 60),
                ("Databases", 20, 90),
            ]),
        ],
    },
    RoadmapDef {
        id: "system",
        title: "System Design",
        description: "Design scalable distributed systems like a senior engineer",
        category: "architecture",
        difficulty: Difficulty::Advanced,
        hours: 80,
        sections: &[
            ("Building Blocks", &[
                ("Load Balancing", 20, 45),
                ("Caching", 20, 45),
                ("Message Queues", 20, 60),
            ]),
            ("Data at Scale", &[
                ("Replication", 25, 60),
                ("Sharding", 25, 60),
            ]),
        ],
    },
];

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Expand a roadmap table entry into catalog records
fn build_roadmap(def: &RoadmapDef) -> (Roadmap, Vec<Section>, Vec<Topic>) {
    let mut sections = Vec::new();
    let mut topics = Vec::new();

    for (s_idx, (section_title, topic_defs)) in def.sections.iter().enumerate() {
        let section_id = format!("{}-{}", def.id, slug(section_title));
        sections.push(Section {
            id: section_id.clone(),
            roadmap_id: def.id.to_string(),
            title: section_title.to_string(),
            description: None,
            order_index: s_idx as u32,
        });
        for (t_idx, (topic_title, xp, minutes)) in topic_defs.iter().enumerate() {
            topics.push(Topic {
                id: format!("{}-{}", def.id, slug(topic_title)),
                section_id: section_id.clone(),
                roadmap_id: def.id.to_string(),
                title: topic_title.to_string(),
                description: None,
                order_index: t_idx as u32,
                xp_reward: *xp,
                estimated_minutes: Some(*minutes),
            });
        }
    }

    let roadmap = Roadmap {
        id: def.id.to_string(),
        title: def.title.to_string(),
        description: Some(def.description.to_string()),
        category: def.category.to_string(),
        difficulty: def.difficulty,
        estimated_hours: Some(def.hours),
        is_official: true,
        is_public: true,
        creator_id: None,
        total_topics: topics.len() as u32,
    };
    (roadmap, sections, topics)
}

fn seed_roadmaps(store: &LmdbCatalogStore) -> Result<usize, CatalogStoreError> {
    let mut count = 0;
    for def in ROADMAPS {
        let (roadmap, sections, topics) = build_roadmap(def);

        store.put_roadmap(&roadmap)?;
        let section_items: Vec<(&str, &Section)> =
            sections.iter().map(|s| (s.id.as_str(), s)).collect();
        let topic_items: Vec<(&str, &Topic)> = topics.iter().map(|t| (t.id.as_str(), t)).collect();
        count += 1;
        count += store.bulk_put(store.sections, &section_items)?;
        count += store.bulk_put(store.topics, &topic_items)?;
    }
    info!("Seeded {} official roadmaps", ROADMAPS.len());
    Ok(count)
}

// ============================================================================
// Badges
// ============================================================================

pub fn default_badges() -> Vec<Badge> {
    use BadgeRequirement::*;

    let defs: [(&str, &str, &str, &str, BadgeCategory, BadgeRequirement, u32); 9] = [
        ("first-steps", "First Steps", "Complete your first topic", "footprints", BadgeCategory::Completion, TopicsCompleted(1), 10),
        ("getting-started", "Getting Started", "Complete 10 topics", "book-open", BadgeCategory::Completion, TopicsCompleted(10), 50),
        ("dedicated-learner", "Dedicated Learner", "Complete 50 topics", "graduation-cap", BadgeCategory::Completion, TopicsCompleted(50), 200),
        ("on-fire", "On Fire", "Maintain a 3-day streak", "flame", BadgeCategory::Streak, StreakDays(3), 25),
        ("week-warrior", "Week Warrior", "Maintain a 7-day streak", "calendar-check", BadgeCategory::Streak, StreakDays(7), 75),
        ("monthly-master", "Monthly Master", "Maintain a 30-day streak", "crown", BadgeCategory::Streak, StreakDays(30), 300),
        ("roadmap-finisher", "Roadmap Finisher", "Complete an entire roadmap", "flag", BadgeCategory::Milestone, RoadmapsCompleted(1), 100),
        ("xp-hunter", "XP Hunter", "Earn 1,000 XP", "zap", BadgeCategory::Milestone, TotalXp(1_000), 100),
        ("xp-legend", "XP Legend", "Earn 10,000 XP", "trophy", BadgeCategory::Special, TotalXp(10_000), 500),
    ];

    defs.into_iter()
        .map(|(id, name, description, icon, category, requirement, xp_reward)| Badge {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            category,
            requirement,
            xp_reward,
        })
        .collect()
}

fn seed_badges(store: &LmdbCatalogStore) -> Result<usize, CatalogStoreError> {
    let badges = default_badges();
    let items: Vec<(&str, &Badge)> = badges.iter().map(|b| (b.id.as_str(), b)).collect();
    let count = store.bulk_put(store.badges, &items)?;
    info!("Seeded {} badges", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Data Structures & Algorithms"), "data-structures-algorithms");
        assert_eq!(slug("TCP/IP Basics"), "tcp-ip-basics");
    }

    #[test]
    fn test_topic_ids_unique_across_catalog() {
        let mut ids = std::collections::HashSet::new();
        for def in ROADMAPS {
            let (_, _, topics) = build_roadmap(def);
            for t in topics {
                assert!(ids.insert(t.id.clone()), "duplicate topic id {}", t.id);
            }
        }
    }

    #[test]
    fn test_default_badges_have_positive_thresholds() {
        let badges = default_badges();
        assert_eq!(badges.len(), 9);
        assert!(badges.iter().all(|b| b.requirement.threshold() > 0));
    }
}
