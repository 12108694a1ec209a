//! Language-model boundary — intent classification and response narration.
//!
//! Backends live in `providers/` behind an enum: enum dispatch avoids `dyn`
//! trait objects and the `async-trait` dependency. Each backend exposes one
//! round-trip — `complete(system, user)` — and everything conversational
//! (prompts, context, fallbacks) lives here.
//!
//! Two hard guarantees callers rely on:
//! - [`LanguageModel::classify`] is total. Transport errors, timeouts, and
//!   malformed structured output all degrade to the `help` intent with empty
//!   parameters; nothing propagates.
//! - Narration overflow is a *typed* signal ([`ProviderError::Overflow`]),
//!   decided by a character-length pre-check on the serialized input before
//!   any request is sent — never by matching provider error text.

pub mod providers;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::intent::{ConversationContext, Intent, IntentKind, Params};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("narration input exceeds model budget ({actual} > {budget} chars)")]
    Overflow { actual: usize, budget: usize },

    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Backend enum ──────────────────────────────────────────────────────────────

/// All available LLM backends.
///
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmBackend {
    Dummy(providers::dummy::DummyProvider),
    OpenAi(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmBackend {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        match self {
            Self::Dummy(p) => p.complete(system, user).await,
            Self::OpenAi(p) => p.complete(system, user, temperature, max_tokens).await,
        }
    }
}

// ── Language model ────────────────────────────────────────────────────────────

pub struct LanguageModel {
    backend: LlmBackend,
    narrate_input_budget: usize,
}

impl LanguageModel {
    pub fn new(backend: LlmBackend, narrate_input_budget: usize) -> Self {
        Self { backend, narrate_input_budget }
    }

    /// Map free text to an [`Intent`]. Never fails: any error on the way —
    /// transport, timeout, unparseable output, unknown intent name — yields
    /// the `help` fallback.
    pub async fn classify(&self, text: &str, context: &ConversationContext) -> Intent {
        let user = classification_user_message(text, context);
        let raw = match self
            .backend
            .complete(CLASSIFY_SYSTEM_PROMPT, &user, 0.2, 300)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "classification failed — falling back to help");
                return Intent::help();
            }
        };
        match parse_intent_json(&raw) {
            Some(intent) => {
                debug!(intent = intent.kind.as_str(), "query classified");
                intent
            }
            None => {
                warn!(raw_len = raw.len(), "unparseable classification output — falling back to help");
                Intent::help()
            }
        }
    }

    /// Turn a structured payload into a natural-language reply.
    ///
    /// Fails with [`ProviderError::Overflow`] when the serialized input
    /// exceeds the configured character budget; the caller retries once with
    /// an extreme-limited payload.
    pub async fn narrate(&self, input: &Value) -> Result<String, ProviderError> {
        let input_text = serde_json::to_string_pretty(input)
            .map_err(|e| ProviderError::Request(format!("serialise narration input: {e}")))?;
        if input_text.len() > self.narrate_input_budget {
            return Err(ProviderError::Overflow {
                actual: input_text.len(),
                budget: self.narrate_input_budget,
            });
        }
        self.backend
            .complete(NARRATE_SYSTEM_PROMPT, &input_text, 0.7, 800)
            .await
    }
}

// ── Prompts ───────────────────────────────────────────────────────────────────

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are an assistant that parses user queries about TV series and movies into structured intents and parameters.

Possible intents:
- search_entity: find TV series based on criteria
- get_entity_details: detailed information about a specific series
- get_similar_entities: recommendations similar to a specific series
- get_person_credits: what series or movies a person has been in
- get_entities_by_source: series from a specific network or platform
- get_upcoming_entities: upcoming series
- get_entity_episodes: episodes of a series
- get_next_release: when the next episode will air
- get_entity_artwork: images or artwork for a series
- get_entity_awards: awards a series has won or been nominated for
- get_related_media_awards: awards for a movie related to a series query
- advanced_search: search with multiple criteria or filters
- get_character_details: information about a character
- update_preferences: the user is sharing their preferences
- search_media: find movies based on criteria
- get_media_details: detailed information about a specific movie
- get_similar_media: recommendations similar to a specific movie
- get_media_by_person: movies by a specific director or actor
- get_media_awards: awards a movie has won
- get_trending_media: popular or trending movies
- recommend_media: movie recommendations
- help: the user needs help using the system

Parameters to extract (when applicable): entity_name, media_name, actor_name,
character_name, director_name, genre, genres, network, season, episode, year,
status, country, language.

Return a JSON object: {"intent": "intent_name", "parameters": {...}}.
If a parameter is mentioned but ambiguous, include it with a null value.
If the intent is unclear, use "help".
Prefer movie intents when the query mentions movies or films, or asks for a
recommendation without specifying TV shows."#;

const NARRATE_SYSTEM_PROMPT: &str = r#"You are a helpful TV and movie recommendation assistant.
Generate a natural, conversational response to the user's query based on the
provided search results. Highlight genres, cast, ratings, and air dates. If
recommending several titles, briefly say why each one matches. If the search
returned no results, acknowledge this and suggest alternatives. Keep responses
concise but informative. Base responses solely on the provided data — never
invent information."#;

/// Last few turns, known preferences, then the current query.
fn classification_user_message(text: &str, context: &ConversationContext) -> String {
    let mut msg = String::new();
    let recent = context.recent_turns.iter().rev().take(3).rev();
    let mut any_history = false;
    for (i, turn) in recent.enumerate() {
        if !any_history {
            msg.push_str("Previous messages in the conversation:\n");
            any_history = true;
        }
        msg.push_str(&format!("User {}: {}\n", i + 1, turn.text));
    }
    let prefs = &context.preferences;
    if !prefs.is_empty() {
        msg.push_str("\nKnown user preferences:\n");
        if !prefs.favorite_genres.is_empty() {
            msg.push_str(&format!("- Favorite genres: {}\n", prefs.favorite_genres.join(", ")));
        }
        if !prefs.favorite_people.is_empty() {
            msg.push_str(&format!("- Favorite people: {}\n", prefs.favorite_people.join(", ")));
        }
        if !prefs.preferred_sources.is_empty() {
            msg.push_str(&format!("- Preferred networks: {}\n", prefs.preferred_sources.join(", ")));
        }
    }
    if !msg.is_empty() {
        msg.push('\n');
    }
    msg.push_str("Current query: ");
    msg.push_str(text);
    msg
}

/// Extract the outermost `{...}` from a completion and parse it into an
/// [`Intent`]. Unknown intent names and non-object parameter maps are
/// rejected (→ `None` → help fallback upstream).
fn parse_intent_json(raw: &str) -> Option<Intent> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let parsed: Value = serde_json::from_str(&raw[start..=end]).ok()?;
    let kind = IntentKind::from_name(parsed["intent"].as_str()?)?;
    let params = match parsed.get("parameters") {
        None | Some(Value::Null) => Params::new(),
        Some(obj) => serde_json::from_value(obj.clone()).ok()?,
    };
    Some(Intent::new(kind, params))
}
