//! Intent dispatch — routes a classified [`Intent`] to a metadata lookup
//! strategy and produces a structured JSON payload for narration.
//!
//! Dispatch is total: handlers return `Result<Value, HandlerError>` and this
//! module converts every `Err` into a structured `{"error": ...}` payload.
//! Nothing escapes as a Rust error; the narrator explains failure payloads
//! to the user the same way it explains results.
//!
//! ID normalization happens exactly once, at this boundary. Upstream search
//! hits carry composite string IDs (`"series-81189"`) while detail endpoints
//! want bare integers; [`normalize_id`] accepts integers, digit strings, and
//! `kind-digits` composites, and rejects everything else.

mod entity;
mod media;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::intent::{ConversationContext, Intent, IntentKind, Params};
use crate::memory::SessionStore;
use crate::metadata::{MetadataError, MetadataProvider, SearchFilters};

/// Default result cap requested from search-style provider calls.
const SEARCH_LIMIT: usize = 10;

// ── Handler error ─────────────────────────────────────────────────────────────

/// Failure modes a handler can surface. All of them become structured
/// payloads; none propagate past `dispatch`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An ID-shaped parameter that is neither an integer, a digit string,
    /// nor a `kind-digits` composite.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The request referenced something the catalog does not have, or
    /// omitted a parameter the handler cannot proceed without.
    #[error("{0}")]
    NotFound(String),

    /// Every fallback rung came up empty. Carries recovery suggestions for
    /// the narrator to offer.
    #[error("{message}")]
    Exhausted { message: String, suggestions: Vec<String> },
}

impl HandlerError {
    fn into_payload(self) -> Value {
        match self {
            Self::Exhausted { message, suggestions } => {
                json!({"error": message, "suggestions": suggestions})
            }
            other => json!({"error": other.to_string()}),
        }
    }
}

// ── ID normalization ──────────────────────────────────────────────────────────

/// Accepts `81189`, `"81189"`, and `"series-81189"`; rejects `"series-abc"`
/// and everything else.
pub fn normalize_id(raw: &Value) -> Result<i64, HandlerError> {
    if let Some(n) = raw.as_i64() {
        return Ok(n);
    }
    if let Some(s) = raw.as_str() {
        let digits = match s.rsplit_once('-') {
            Some((_, tail)) => tail,
            None => s,
        };
        if let Ok(n) = digits.trim().parse::<i64>() {
            return Ok(n);
        }
    }
    Err(HandlerError::InvalidIdentifier(format!("{raw}")))
}

/// Payload keys whose array items are series/movie records. Only their IDs
/// (and a top-level `id`) feed the last-entity-context; episode, character,
/// and artwork records carry their own `id` fields that must not leak into
/// the context.
const ENTITY_LIST_KEYS: &[&str] = &[
    "results",
    "entities",
    "media",
    "similar_entities",
    "similar_media",
    "recommended_media",
    "trending_media",
    "credits",
];

/// Normalizable IDs from a dispatch payload, in encounter order: the
/// payload's own `id`, then the items of each known result-list key. Feeds
/// the session's last-entity-context after each turn.
pub fn extract_entity_ids(payload: &Value) -> Vec<i64> {
    let mut ids = Vec::new();
    let Some(map) = payload.as_object() else {
        return ids;
    };
    if let Some(raw) = map.get("id") {
        push_id(raw, &mut ids);
    }
    for key in ENTITY_LIST_KEYS {
        if let Some(items) = map.get(*key).and_then(Value::as_array) {
            for item in items {
                if let Some(raw) = item.get("id") {
                    push_id(raw, &mut ids);
                }
            }
        }
    }
    ids
}

fn push_id(raw: &Value, out: &mut Vec<i64>) {
    if let Ok(id) = normalize_id(raw) {
        if !out.contains(&id) {
            out.push(id);
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub struct Dispatcher {
    provider: MetadataProvider,
}

impl Dispatcher {
    pub fn new(provider: MetadataProvider) -> Self {
        Self { provider }
    }

    /// Route one intent. Always returns a payload — errors become
    /// `{"error": ..., "suggestions"?: [...]}` objects.
    pub async fn dispatch(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        store: &SessionStore,
        session_key: &str,
    ) -> Value {
        let params = &intent.params;
        let result = match intent.kind {
            IntentKind::SearchEntity => self.search_entity(params).await,
            IntentKind::GetEntityDetails => self.get_entity_details(params, context).await,
            IntentKind::GetSimilarEntities => self.get_similar_entities(params, context).await,
            IntentKind::GetPersonCredits => self.get_person_credits(params).await,
            IntentKind::GetEntitiesBySource => self.get_entities_by_source(params).await,
            IntentKind::GetUpcomingEntities => self.get_upcoming_entities(params).await,
            IntentKind::GetEntityEpisodes => self.get_entity_episodes(params, context).await,
            IntentKind::GetNextRelease => self.get_next_release(params, context).await,
            IntentKind::GetEntityArtwork => self.get_entity_artwork(params, context).await,
            IntentKind::GetEntityAwards => self.get_entity_awards(params, context).await,
            IntentKind::GetRelatedMediaAwards => self.get_related_media_awards(params).await,
            IntentKind::AdvancedSearch => self.advanced_search(params).await,
            IntentKind::GetCharacterDetails => self.get_character_details(params, context).await,
            IntentKind::UpdatePreferences => {
                Ok(update_preferences(params, store, session_key))
            }
            IntentKind::SearchMedia => self.search_media(params).await,
            IntentKind::GetMediaDetails => self.get_media_details(params).await,
            IntentKind::GetSimilarMedia => self.get_similar_media(params, context).await,
            IntentKind::GetMediaByPerson => self.get_media_by_person(params).await,
            IntentKind::GetMediaAwards => self.get_media_awards(params).await,
            IntentKind::GetTrendingMedia => self.get_trending_media(params).await,
            IntentKind::RecommendMedia => self.recommend_media(params, context).await,
            IntentKind::Help => Ok(help_payload()),
        };

        match result {
            Ok(payload) => payload,
            Err(e) => {
                debug!(intent = intent.kind.as_str(), error = %e, "handler returned error payload");
                e.into_payload()
            }
        }
    }

    // ── shared resolution helpers ─────────────────────────────────────

    /// Resolve a series ID from, in order: an explicit ID parameter, a name
    /// parameter (via search), then the session's last-entity-context.
    async fn resolve_entity_id(
        &self,
        params: &Params,
        context: &ConversationContext,
        subject: &str,
    ) -> Result<i64, HandlerError> {
        if let Some(raw) = params.get("entity_id").or_else(|| params.get("id")) {
            let raw = serde_json::to_value(raw).unwrap_or(Value::Null);
            return normalize_id(&raw);
        }
        if let Some(name) = entity_name(params) {
            return self.entity_id_by_name(name).await;
        }
        if let Some(id) = context.last_entities.first() {
            debug!(id, "resolved {subject} from conversation context");
            return Ok(*id);
        }
        Err(HandlerError::NotFound(format!(
            "I need to know which series you mean for {subject}. Please name one."
        )))
    }

    async fn entity_id_by_name(&self, name: &str) -> Result<i64, HandlerError> {
        let hits = self
            .provider
            .search_entities(name, 1, &SearchFilters::default())
            .await
            .unwrap_or_else(log_as_empty);
        match hits.first() {
            Some(hit) => normalize_id(&hit["id"]),
            None => Err(HandlerError::NotFound(format!(
                "Could not find series '{name}'"
            ))),
        }
    }

    async fn media_id_by_name(&self, name: &str) -> Result<i64, HandlerError> {
        let hits = self
            .provider
            .search_media(name, 1)
            .await
            .unwrap_or_else(log_as_empty);
        match hits.first() {
            Some(hit) => normalize_id(&hit["id"]),
            None => Err(HandlerError::NotFound(format!(
                "Could not find movie '{name}'"
            ))),
        }
    }
}

// ── non-lookup intents ────────────────────────────────────────────────────────

fn help_payload() -> Value {
    json!({
        "message": "I can answer questions about TV series and movies.",
        "capabilities": [
            "Search for series or movies by name, genre, year, or network",
            "Show details, episodes, cast, artwork, and awards for a title",
            "Find titles similar to one you liked",
            "Tell you what's trending or coming up",
            "Recommend movies based on your tastes",
            "Remember your favorite genres, people, and networks",
        ],
        "examples": [
            "tell me about Breaking Bad",
            "shows like The Wire",
            "what's trending?",
            "recommend a crime movie from the 90s",
        ],
    })
}

fn update_preferences(params: &Params, store: &SessionStore, session_key: &str) -> Value {
    let mut genres = params.get_string_items("genres");
    genres.extend(params.get_string_items("genre"));
    genres.extend(params.get_string_items("favorite_genres"));

    let mut people = params.get_string_items("actor_name");
    people.extend(params.get_string_items("person_name"));
    people.extend(params.get_string_items("director_name"));
    people.extend(params.get_string_items("favorite_people"));

    let mut sources = params.get_string_items("network");
    sources.extend(params.get_string_items("source"));
    sources.extend(params.get_string_items("preferred_sources"));

    let entity_ids: Vec<i64> = params
        .get("favorite_entities")
        .map(|v| match v {
            crate::intent::ParamValue::List(items) => {
                items.iter().filter_map(|i| i.as_i64()).collect()
            }
            other => other.as_i64().into_iter().collect(),
        })
        .unwrap_or_default();

    let prefs = store.update_preferences(session_key, &genres, &entity_ids, &people, &sources);
    json!({
        "status": "preferences updated",
        "preferences": {
            "favorite_genres": prefs.favorite_genres,
            "favorite_entities": prefs.favorite_entities,
            "favorite_people": prefs.favorite_people,
            "preferred_sources": prefs.preferred_sources,
        },
    })
}

// ── shared parameter readers ──────────────────────────────────────────────────

fn entity_name(params: &Params) -> Option<&str> {
    params
        .get_str("entity_name")
        .or_else(|| params.get_str("series_name"))
        .or_else(|| params.get_str("name"))
}

fn media_name(params: &Params) -> Option<&str> {
    params
        .get_str("media_name")
        .or_else(|| params.get_str("movie_name"))
        .or_else(|| params.get_str("title"))
}

fn person_name(params: &Params) -> Option<&str> {
    params
        .get_str("actor_name")
        .or_else(|| params.get_str("person_name"))
        .or_else(|| params.get_str("director_name"))
}

/// Pull records mentioning a title (by ID or name) out of the global awards
/// catalog. Categories nest their records under `records` or `nominees`;
/// each hit is tagged with the category name.
fn scan_awards_catalog(catalog: &[Value], id: i64, name: Option<&str>) -> Vec<Value> {
    let name_lower = name.map(str::to_lowercase);
    let mut found = Vec::new();
    for category in catalog {
        let records = category["records"]
            .as_array()
            .or_else(|| category["nominees"].as_array());
        let Some(records) = records else { continue };
        for record in records {
            let id_match = record["seriesId"].as_i64() == Some(id)
                || record["movieId"].as_i64() == Some(id)
                || record["series"]["id"].as_i64() == Some(id)
                || record["movie"]["id"].as_i64() == Some(id);
            let name_match = name_lower.as_deref().is_some_and(|want| {
                record["name"]
                    .as_str()
                    .or_else(|| record["series"]["name"].as_str())
                    .or_else(|| record["movie"]["name"].as_str())
                    .is_some_and(|n| n.to_lowercase().contains(want))
            });
            if id_match || name_match {
                let mut hit = record.clone();
                if let Some(award) = category["name"].as_str() {
                    hit["award"] = json!(award);
                }
                found.push(hit);
            }
        }
    }
    found
}

/// Provider errors count as empty results for fallback purposes.
fn log_as_empty(e: MetadataError) -> Vec<Value> {
    warn!(error = %e, "metadata call failed; treating as empty");
    Vec::new()
}

fn filters_from_params(params: &Params) -> SearchFilters {
    let mut genres = params.get_string_items("genres");
    if genres.is_empty() {
        genres = params.get_string_items("genre");
    }
    SearchFilters {
        query: params
            .get_str("query")
            .or_else(|| entity_name(params))
            .or_else(|| media_name(params))
            .map(str::to_string),
        kind: params.get_str("kind").or_else(|| params.get_str("type")).map(str::to_string),
        year: params.get_i64("year"),
        country: params.get_str("country").map(str::to_string),
        network: params
            .get_str("network")
            .or_else(|| params.get_str("source"))
            .map(str::to_string),
        status: params.get_str("status").map(str::to_string),
        genres,
        people: person_name(params).map(str::to_string).into_iter().collect(),
        company: params.get_str("company").map(str::to_string),
        director: params.get_str("director_name").map(str::to_string),
        language: params.get_str("language").map(str::to_string),
        primary_type: params.get_str("primary_type").map(str::to_string),
        remote_id: params.get_str("remote_id").map(str::to_string),
    }
}
