//! Dummy LLM provider — deterministic keyword classification and canned
//! narration. Drives tests and offline runs without an API key.
//!
//! Classification reads the `Current query:` line the boundary appends to
//! every classification message and applies a small keyword table shaped
//! after the real classifier's prompt rules. Narration echoes a short
//! summary of the structured input.

use serde_json::json;

use crate::llm::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Keyword,
    Fail,
}

#[derive(Debug, Clone)]
pub struct DummyProvider {
    mode: Mode,
}

impl DummyProvider {
    pub fn new() -> Self {
        Self { mode: Mode::Keyword }
    }

    /// A provider whose every call fails — exercises fallback paths.
    pub fn failing() -> Self {
        Self { mode: Mode::Fail }
    }

    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        if self.mode == Mode::Fail {
            return Err(ProviderError::Request("dummy: forced failure".into()));
        }
        // The classification system prompt asks for JSON; narration doesn't.
        if system.contains("structured intents") {
            Ok(classify_by_keyword(current_query(user)))
        } else {
            let preview: String = user.chars().take(120).collect();
            Ok(format!("Here's what I found based on the data: {preview}"))
        }
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn current_query(user: &str) -> &str {
    user.rsplit_once("Current query: ")
        .map(|(_, q)| q)
        .unwrap_or(user)
        .trim()
}

fn classify_by_keyword(query: &str) -> String {
    let q = query.to_lowercase();
    let trimmed = query.trim_end_matches(['?', '.', '!']);

    let (intent, params) = if q.contains("help") {
        ("help", json!({}))
    } else if let Some(rest) = subject_after(trimmed, " like ") {
        // "shows like Breaking Bad" names a target; "more like that" doesn't.
        let movie = q.contains("movie") || q.contains("film");
        let intent = if movie { "get_similar_media" } else { "get_similar_entities" };
        let key = if movie { "media_name" } else { "entity_name" };
        match rest {
            Some(name) => (intent, json!({key: name})),
            None => (intent, json!({})),
        }
    } else if q.contains("trending") || q.contains("popular") {
        ("get_trending_media", json!({}))
    } else if q.contains("recommend") || q.contains("suggest") {
        ("recommend_media", json!({}))
    } else if q.contains("upcoming") {
        ("get_upcoming_entities", json!({}))
    } else if q.contains("episode") {
        ("get_entity_episodes", json!({}))
    } else if q.contains("award") {
        ("get_entity_awards", json!({}))
    } else if q.contains("who stars") || q.contains("filmography") {
        ("get_person_credits", json!({}))
    } else if q.contains("movie") || q.contains("film") {
        ("search_media", json!({"media_name": trimmed}))
    } else if let Some(name) = trimmed.strip_prefix("tell me about ") {
        ("get_entity_details", json!({"entity_name": name}))
    } else {
        ("help", json!({}))
    };

    json!({"intent": intent, "parameters": params}).to_string()
}

/// Text after the last ` like `, unless it's an anaphor ("that", "it"...).
/// Outer `None` = no " like " present; inner `None` = present but unnamed.
#[allow(clippy::option_option)]
fn subject_after<'a>(text: &'a str, marker: &str) -> Option<Option<&'a str>> {
    let (_, rest) = text.rsplit_once(marker)?;
    let rest = rest.trim();
    match rest.to_lowercase().as_str() {
        "" | "that" | "it" | "this" | "that one" | "those" => Some(None),
        _ => Some(Some(rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent_of(query: &str) -> String {
        let parsed: serde_json::Value =
            serde_json::from_str(&classify_by_keyword(query)).unwrap();
        parsed["intent"].as_str().unwrap().to_string()
    }

    #[test]
    fn named_similar_query() {
        let raw = classify_by_keyword("shows like Breaking Bad");
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["intent"], "get_similar_entities");
        assert_eq!(parsed["parameters"]["entity_name"], "Breaking Bad");
    }

    #[test]
    fn anaphoric_similar_query_has_no_name() {
        let raw = classify_by_keyword("more like that");
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["intent"], "get_similar_entities");
        assert!(parsed["parameters"].as_object().unwrap().is_empty());
    }

    #[test]
    fn keyword_table() {
        assert_eq!(intent_of("what's trending right now?"), "get_trending_media");
        assert_eq!(intent_of("recommend me something"), "recommend_media");
        assert_eq!(intent_of("any upcoming fantasy series?"), "get_upcoming_entities");
        assert_eq!(intent_of("help"), "help");
        assert_eq!(intent_of("what awards did it win"), "get_entity_awards");
        assert_eq!(intent_of("gibberish input"), "help");
    }

    #[tokio::test]
    async fn failing_provider_always_errors() {
        let p = DummyProvider::failing();
        assert!(p.complete("s", "u").await.is_err());
    }
}
