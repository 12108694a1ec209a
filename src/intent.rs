//! Intent model — the typed interpretation of a user utterance.
//!
//! `IntentKind` is a closed enumeration: the dispatch engine switches on it
//! and the classification boundary guarantees it never produces anything
//! outside it (unknown names degrade to `Help`). Parameters are a closed sum
//! type rather than raw JSON so handlers get typed accessors while still
//! accepting whatever shape the classifier emits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Intent vocabulary ─────────────────────────────────────────────────────────

/// Every intent the dispatch engine understands.
///
/// Adding an intent = new variant + new `as_str`/`from_name` arm + a handler
/// arm in `dispatch`. The compiler flags any arm left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    SearchEntity,
    GetEntityDetails,
    GetSimilarEntities,
    GetPersonCredits,
    GetEntitiesBySource,
    GetUpcomingEntities,
    GetEntityEpisodes,
    GetNextRelease,
    GetEntityArtwork,
    GetEntityAwards,
    GetRelatedMediaAwards,
    AdvancedSearch,
    GetCharacterDetails,
    UpdatePreferences,
    SearchMedia,
    GetMediaDetails,
    GetSimilarMedia,
    GetMediaByPerson,
    GetMediaAwards,
    GetTrendingMedia,
    RecommendMedia,
    Help,
}

impl IntentKind {
    /// The wire name used by the classifier and stored in turn history.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchEntity => "search_entity",
            Self::GetEntityDetails => "get_entity_details",
            Self::GetSimilarEntities => "get_similar_entities",
            Self::GetPersonCredits => "get_person_credits",
            Self::GetEntitiesBySource => "get_entities_by_source",
            Self::GetUpcomingEntities => "get_upcoming_entities",
            Self::GetEntityEpisodes => "get_entity_episodes",
            Self::GetNextRelease => "get_next_release",
            Self::GetEntityArtwork => "get_entity_artwork",
            Self::GetEntityAwards => "get_entity_awards",
            Self::GetRelatedMediaAwards => "get_related_media_awards",
            Self::AdvancedSearch => "advanced_search",
            Self::GetCharacterDetails => "get_character_details",
            Self::UpdatePreferences => "update_preferences",
            Self::SearchMedia => "search_media",
            Self::GetMediaDetails => "get_media_details",
            Self::GetSimilarMedia => "get_similar_media",
            Self::GetMediaByPerson => "get_media_by_person",
            Self::GetMediaAwards => "get_media_awards",
            Self::GetTrendingMedia => "get_trending_media",
            Self::RecommendMedia => "recommend_media",
            Self::Help => "help",
        }
    }

    /// Parse a wire name. Returns `None` for anything outside the vocabulary;
    /// the classification boundary maps that to [`IntentKind::Help`].
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "search_entity" => Self::SearchEntity,
            "get_entity_details" => Self::GetEntityDetails,
            "get_similar_entities" => Self::GetSimilarEntities,
            "get_person_credits" => Self::GetPersonCredits,
            "get_entities_by_source" => Self::GetEntitiesBySource,
            "get_upcoming_entities" => Self::GetUpcomingEntities,
            "get_entity_episodes" => Self::GetEntityEpisodes,
            "get_next_release" => Self::GetNextRelease,
            "get_entity_artwork" => Self::GetEntityArtwork,
            "get_entity_awards" => Self::GetEntityAwards,
            "get_related_media_awards" => Self::GetRelatedMediaAwards,
            "advanced_search" => Self::AdvancedSearch,
            "get_character_details" => Self::GetCharacterDetails,
            "update_preferences" => Self::UpdatePreferences,
            "search_media" => Self::SearchMedia,
            "get_media_details" => Self::GetMediaDetails,
            "get_similar_media" => Self::GetSimilarMedia,
            "get_media_by_person" => Self::GetMediaByPerson,
            "get_media_awards" => Self::GetMediaAwards,
            "get_trending_media" => Self::GetTrendingMedia,
            "recommend_media" => Self::RecommendMedia,
            "help" => Self::Help,
            _ => return None,
        })
    }

    /// All intents, in declaration order. Used by table-driven tests.
    pub fn all() -> &'static [IntentKind] {
        &[
            Self::SearchEntity,
            Self::GetEntityDetails,
            Self::GetSimilarEntities,
            Self::GetPersonCredits,
            Self::GetEntitiesBySource,
            Self::GetUpcomingEntities,
            Self::GetEntityEpisodes,
            Self::GetNextRelease,
            Self::GetEntityArtwork,
            Self::GetEntityAwards,
            Self::GetRelatedMediaAwards,
            Self::AdvancedSearch,
            Self::GetCharacterDetails,
            Self::UpdatePreferences,
            Self::SearchMedia,
            Self::GetMediaDetails,
            Self::GetSimilarMedia,
            Self::GetMediaByPerson,
            Self::GetMediaAwards,
            Self::GetTrendingMedia,
            Self::RecommendMedia,
            Self::Help,
        ]
    }
}

// ── Parameter values ──────────────────────────────────────────────────────────

/// A loosely-typed parameter value with a closed set of shapes.
///
/// The classifier emits JSON; this is the subset we accept. Anything the
/// untagged deserializer cannot match (nested objects, for instance) fails
/// the parse and the boundary falls back to `Help`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Integer view. Numeric strings parse too — season numbers routinely
    /// arrive as `"3"`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Flatten into a list of strings: a list yields its string items, a
    /// bare string yields a single-item list. Used by `update_preferences`,
    /// where the classifier emits either shape.
    pub fn string_items(&self) -> Vec<String> {
        match self {
            Self::Str(s) if !s.is_empty() => vec![s.clone()],
            Self::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Parameter mapping attached to an intent. `BTreeMap` keeps iteration
/// order deterministic for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(pub BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Non-empty string value for `key`, if present.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(ParamValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(ParamValue::as_i64)
    }

    pub fn get_string_items(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .map(ParamValue::string_items)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Intent, Turn, context ─────────────────────────────────────────────────────

/// A resolved query: the live working value passed through dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    #[serde(default)]
    pub params: Params,
}

impl Intent {
    pub fn new(kind: IntentKind, params: Params) -> Self {
        Self { kind, params }
    }

    /// The hard classification fallback: `help` with empty parameters.
    pub fn help() -> Self {
        Self { kind: IntentKind::Help, params: Params::new() }
    }
}

/// Frozen record of one user utterance, owned by the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub text: String,
    pub intent: IntentKind,
    pub params: Params,
}

/// Append-only, duplicate-suppressing preference sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub favorite_genres: Vec<String>,
    pub favorite_entities: Vec<i64>,
    pub favorite_people: Vec<String>,
    pub preferred_sources: Vec<String>,
}

impl Preferences {
    pub fn is_empty(&self) -> bool {
        self.favorite_genres.is_empty()
            && self.favorite_entities.is_empty()
            && self.favorite_people.is_empty()
            && self.preferred_sources.is_empty()
    }
}

/// Append `value` unless already present (case-sensitive exact match).
/// Insertion order is preserved; nothing is ever removed.
pub fn push_unique<T: PartialEq>(seq: &mut Vec<T>, value: T) {
    if !seq.contains(&value) {
        seq.push(value);
    }
}

/// Snapshot of a session handed to classification and narration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub recent_turns: Vec<Turn>,
    pub preferences: Preferences,
    pub last_entities: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in IntentKind::all() {
            assert_eq!(IntentKind::from_name(kind.as_str()), Some(*kind));
        }
        assert_eq!(IntentKind::all().len(), 22);
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(IntentKind::from_name("get_series_details"), None);
        assert_eq!(IntentKind::from_name(""), None);
    }

    #[test]
    fn param_value_deserializes_untagged() {
        let p: ParamValue = serde_json::from_str("\"noir\"").unwrap();
        assert_eq!(p, ParamValue::Str("noir".into()));
        let p: ParamValue = serde_json::from_str("3").unwrap();
        assert_eq!(p.as_i64(), Some(3));
        let p: ParamValue = serde_json::from_str("null").unwrap();
        assert_eq!(p, ParamValue::Null);
        let p: ParamValue = serde_json::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(p.string_items(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn numeric_string_parses_as_i64() {
        assert_eq!(ParamValue::Str("3".into()).as_i64(), Some(3));
        assert_eq!(ParamValue::Str("abc".into()).as_i64(), None);
    }

    #[test]
    fn empty_string_is_absent() {
        let mut params = Params::new();
        params.insert("series", ParamValue::Str(String::new()));
        assert_eq!(params.get_str("series"), None);
    }

    #[test]
    fn string_items_wraps_scalar() {
        assert_eq!(
            ParamValue::Str("drama".into()).string_items(),
            vec!["drama".to_string()]
        );
        assert!(ParamValue::Null.string_items().is_empty());
    }

    #[test]
    fn push_unique_suppresses_duplicates() {
        let mut v = vec!["drama".to_string()];
        push_unique(&mut v, "drama".to_string());
        push_unique(&mut v, "Drama".to_string()); // case-sensitive: distinct
        push_unique(&mut v, "noir".to_string());
        assert_eq!(v, vec!["drama", "Drama", "noir"]);
    }

    #[test]
    fn help_fallback_shape() {
        let i = Intent::help();
        assert_eq!(i.kind, IntentKind::Help);
        assert!(i.params.is_empty());
    }
}
