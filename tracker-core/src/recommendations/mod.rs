//! Suggested next steps
//!
//! The generative model is an optional collaborator. This module owns the
//! parts that do not need the network: the prompt, tolerant parsing of the
//! model's reply, and the static list served whenever anything goes wrong.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Project,
    Topic,
    Challenge,
    Review,
}

impl SuggestionKind {
    /// Map both reply vocabularies onto the four kinds; unknown labels are topics
    fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "project" | "mini_project" => SuggestionKind::Project,
            "challenge" | "streak_tip" => SuggestionKind::Challenge,
            "review" => SuggestionKind::Review,
            _ => SuggestionKind::Topic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Learner context the prompt is built from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionContext {
    pub display_name: Option<String>,
    pub total_xp: u64,
    pub current_streak: u32,
    pub active_roadmaps: Vec<String>,
    pub recent_topics: Vec<String>,
}

pub fn build_prompt(ctx: &SuggestionContext) -> String {
    let active = if ctx.active_roadmaps.is_empty() {
        "None".to_string()
    } else {
        ctx.active_roadmaps.join(", ")
    };
    let recent = if ctx.recent_topics.is_empty() {
        "None yet".to_string()
    } else {
        ctx.recent_topics.join(", ")
    };

    format!(
        "You are a helpful learning assistant for students. Based on the following student \
profile, generate 3 personalized learning suggestions.

Student Profile:
- Name: {name}
- Total XP: {xp}
- Current Streak: {streak} days
- Active Roadmaps: {active}
- Recently Completed Topics: {recent}

Generate exactly 3 suggestions in JSON format. Each suggestion should have:
- title: A short, actionable title (max 8 words)
- description: A brief explanation (max 20 words)
- type: One of \"project\", \"topic\", \"challenge\", \"review\"
- priority: \"high\", \"medium\", or \"low\"

Consider:
1. If they completed foundational topics, suggest a mini project
2. If they have a streak, encourage maintaining it
3. If they haven't started, suggest beginner-friendly topics
4. Mix practical projects with learning

Return ONLY valid JSON array, no markdown or explanation.",
        name = ctx.display_name.as_deref().unwrap_or("Student"),
        xp = ctx.total_xp,
        streak = ctx.current_streak,
    )
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse a model reply: a bare array, or an object holding
/// `suggestions` / `recommendations`.
pub fn parse_suggestions(text: &str) -> Result<Vec<Suggestion>, CoreError> {
    let body = strip_code_fence(text);
    let value: Value =
        serde_json::from_str(body).map_err(|e| CoreError::MalformedSuggestions(e.to_string()))?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("suggestions")
            .or_else(|| map.get("recommendations"))
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::MalformedSuggestions("no suggestion list".into()))?,
        _ => return Err(CoreError::MalformedSuggestions("unexpected JSON shape".into())),
    };

    let suggestions: Vec<Suggestion> = items
        .iter()
        .filter_map(|item| {
            let title = item.get("title")?.as_str()?.trim();
            if title.is_empty() {
                return None;
            }
            let text_field = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or("");
            Some(Suggestion {
                title: title.to_string(),
                description: text_field("description").trim().to_string(),
                kind: SuggestionKind::from_label(text_field("type")),
                priority: Priority::from_label(text_field("priority")),
            })
        })
        .collect();

    if suggestions.is_empty() {
        return Err(CoreError::MalformedSuggestions("empty suggestion list".into()));
    }
    Ok(suggestions)
}

/// Served whenever the model is unavailable or its reply is unusable
pub fn fallback_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion {
            title: "Continue your learning streak".into(),
            description: "Complete at least one topic today to maintain your streak!".into(),
            kind: SuggestionKind::Challenge,
            priority: Some(Priority::High),
        },
        Suggestion {
            title: "Explore a new roadmap".into(),
            description: "Discover new skills and expand your knowledge".into(),
            kind: SuggestionKind::Topic,
            priority: Some(Priority::Medium),
        },
        Suggestion {
            title: "Review completed topics".into(),
            description: "Reinforce what you've learned with a quick review".into(),
            kind: SuggestionKind::Review,
            priority: Some(Priority::Low),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array_in_fence() {
        let reply = "```json\n[{\"title\":\"Build a CLI\",\"description\":\"Use clap\",\"type\":\"project\",\"priority\":\"high\"}]\n```";
        let parsed = parse_suggestions(reply).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, SuggestionKind::Project);
        assert_eq!(parsed[0].priority, Some(Priority::High));
    }

    #[test]
    fn test_parse_recommendations_object() {
        let reply = r#"{"recommendations":[
            {"type":"streak_tip","title":"Keep going","description":"One topic a day"},
            {"type":"mini_project","title":"Todo app","description":"Practice state"},
            {"type":"new_roadmap","title":"Try SQL","description":"Data skills"}
        ]}"#;
        let parsed = parse_suggestions(reply).unwrap();
        let kinds: Vec<SuggestionKind> = parsed.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SuggestionKind::Challenge, SuggestionKind::Project, SuggestionKind::Topic]
        );
        assert!(parsed.iter().all(|s| s.priority.is_none()));
    }

    #[test]
    fn test_parse_rejects_prose_and_empty() {
        assert!(parse_suggestions("Sure! Here are some ideas...").is_err());
        assert!(parse_suggestions("[]").is_err());
        assert!(parse_suggestions(r#"[{"description":"no title"}]"#).is_err());
        assert!(parse_suggestions(r#"{"ideas":[]}"#).is_err());
    }

    #[test]
    fn test_prompt_mentions_context() {
        let ctx = SuggestionContext {
            display_name: Some("Grace".into()),
            total_xp: 340,
            current_streak: 4,
            active_roadmaps: vec!["Rust Fundamentals".into()],
            recent_topics: vec![],
        };
        let prompt = build_prompt(&ctx);
        assert!(prompt.contains("Name: Grace"));
        assert!(prompt.contains("Total XP: 340"));
        assert!(prompt.contains("Current Streak: 4 days"));
        assert!(prompt.contains("Active Roadmaps: Rust Fundamentals"));
        assert!(prompt.contains("Recently Completed Topics: None yet"));
    }

    #[test]
    fn test_fallback_has_three_ranked_suggestions() {
        let list = fallback_suggestions();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].priority, Some(Priority::High));
        let json = serde_json::to_value(&list[0]).unwrap();
        assert_eq!(json["type"], "challenge");
    }
}
