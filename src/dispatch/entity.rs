//! Series-side intent handlers.
//!
//! Each handler resolves its subject (explicit ID, name search, or the
//! conversation's last-entity-context), runs its lookup strategy, and
//! returns a payload shaped for the degradation pipeline: result lists
//! under well-known keys, identity fields at the top level.

use serde_json::{json, Value};
use tracing::debug;

use crate::intent::{ConversationContext, Params};

use super::{
    entity_name, filters_from_params, log_as_empty, media_name, person_name,
    scan_awards_catalog, Dispatcher, HandlerError, SEARCH_LIMIT,
};

impl Dispatcher {
    /// Name-first search with a genre rescue: when a name search comes up
    /// empty and the request carries a genre, the genre is retried as the
    /// query itself.
    pub(super) async fn search_entity(&self, params: &Params) -> Result<Value, HandlerError> {
        let genre = params.get_str("genre");
        let query = entity_name(params)
            .or_else(|| params.get_str("query"))
            .or(genre)
            .ok_or_else(|| {
                HandlerError::NotFound(
                    "I need a series name or a genre to search for.".to_string(),
                )
            })?;
        let filters = filters_from_params(params);

        let mut results = self
            .provider
            .search_entities(query, SEARCH_LIMIT, &filters)
            .await
            .unwrap_or_else(log_as_empty);

        let mut fallback = None;
        if results.is_empty() {
            if let Some(genre) = genre.filter(|g| *g != query) {
                results = self
                    .provider
                    .search_entities(genre, SEARCH_LIMIT, &filters)
                    .await
                    .unwrap_or_else(log_as_empty);
                if !results.is_empty() {
                    fallback = Some("genre_query");
                }
            }
        }

        let mut payload = json!({"query": query, "results": results});
        if let Some(tag) = fallback {
            payload["fallback"] = json!(tag);
        }
        Ok(payload)
    }

    pub(super) async fn get_entity_details(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = self.resolve_entity_id(params, context, "details").await?;
        self.provider
            .get_entity_details(id)
            .await
            .map_err(|e| HandlerError::NotFound(e.to_string()))
    }

    /// "More like that": an unnamed request falls back to the most recent
    /// entity the conversation talked about.
    pub(super) async fn get_similar_entities(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = self
            .resolve_entity_id(params, context, "similar titles")
            .await?;
        let similar = self
            .provider
            .get_similar_entities(id)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"origin_id": id, "similar_entities": similar}))
    }

    pub(super) async fn get_person_credits(&self, params: &Params) -> Result<Value, HandlerError> {
        let name = person_name(params).ok_or_else(|| {
            HandlerError::NotFound("Whose credits should I look up?".to_string())
        })?;
        let credits = self
            .provider
            .get_person_credits(name)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"person": name, "credits": credits}))
    }

    /// Network/platform listing; an empty listing degrades to a general
    /// search with the source name as the query.
    pub(super) async fn get_entities_by_source(
        &self,
        params: &Params,
    ) -> Result<Value, HandlerError> {
        let source = params
            .get_str("network")
            .or_else(|| params.get_str("source"))
            .ok_or_else(|| {
                HandlerError::NotFound("Which network or platform do you mean?".to_string())
            })?;

        let mut results = self
            .provider
            .get_entities_by_source(source, SEARCH_LIMIT)
            .await
            .unwrap_or_else(log_as_empty);

        let mut fallback = None;
        if results.is_empty() {
            results = self
                .provider
                .search_entities(source, SEARCH_LIMIT, &Default::default())
                .await
                .unwrap_or_else(log_as_empty);
            if !results.is_empty() {
                fallback = Some("search");
            }
        }

        let mut payload = json!({"source": source, "results": results});
        if let Some(tag) = fallback {
            payload["fallback"] = json!(tag);
        }
        Ok(payload)
    }

    pub(super) async fn get_upcoming_entities(
        &self,
        params: &Params,
    ) -> Result<Value, HandlerError> {
        let genre = params.get_str("genre");
        let upcoming = self
            .provider
            .get_upcoming_entities(genre)
            .await
            .unwrap_or_else(log_as_empty);
        let mut payload = json!({"results": upcoming});
        if let Some(g) = genre {
            payload["genre"] = json!(g);
        }
        Ok(payload)
    }

    /// Episode listing, optionally narrowed to a season, sorted by episode
    /// number then name. An empty listing is an error with suggestions —
    /// unlike searches, the user asked about a specific thing we resolved.
    pub(super) async fn get_entity_episodes(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = self.resolve_entity_id(params, context, "episodes").await?;
        let season = params.get_i64("season");

        let mut episodes = self
            .provider
            .get_entity_episodes(id, season)
            .await
            .unwrap_or_else(log_as_empty);

        if episodes.is_empty() {
            let mut suggestions = vec!["Double-check the series name".to_string()];
            if season.is_some() {
                suggestions.push("Try asking without a season number".to_string());
            }
            return Err(HandlerError::Exhausted {
                message: match season {
                    Some(s) => format!("No episodes found for season {s}."),
                    None => "No episodes found for that series.".to_string(),
                },
                suggestions,
            });
        }

        episodes.sort_by(|a, b| {
            let num = |e: &Value| {
                e["number"]
                    .as_i64()
                    .or_else(|| e["episodeNumber"].as_i64())
                    .unwrap_or(i64::MAX)
            };
            let name = |e: &Value| e["name"].as_str().unwrap_or("").to_string();
            num(a).cmp(&num(b)).then_with(|| name(a).cmp(&name(b)))
        });

        // Series name is decoration; a failed details lookup is not fatal.
        let series_name = self
            .provider
            .get_entity_details(id)
            .await
            .ok()
            .and_then(|d| d["name"].as_str().map(str::to_string));

        Ok(json!({
            "series_id": id,
            "series_name": series_name,
            "season_number": season,
            "episodes_count": episodes.len(),
            "episodes": episodes,
        }))
    }

    pub(super) async fn get_next_release(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = self
            .resolve_entity_id(params, context, "the next episode")
            .await?;
        self.provider
            .get_next_release(id)
            .await
            .map_err(|e| HandlerError::NotFound(e.to_string()))
    }

    pub(super) async fn get_entity_artwork(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = self.resolve_entity_id(params, context, "artwork").await?;
        let artwork = self
            .provider
            .get_entity_artwork(id)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"series_id": id, "artwork": artwork}))
    }

    /// Three-tier awards lookup: awards embedded in the detail record, then
    /// the per-series awards endpoint, then a scan of the global catalog.
    /// The winning tier is tagged so the narrator can qualify the answer.
    pub(super) async fn get_entity_awards(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = self.resolve_entity_id(params, context, "awards").await?;

        let details = self.provider.get_entity_details(id).await.ok();
        let name = details
            .as_ref()
            .and_then(|d| d["name"].as_str().map(str::to_string));

        if let Some(embedded) = details
            .as_ref()
            .and_then(|d| d["awards"].as_array())
            .filter(|a| !a.is_empty())
        {
            return Ok(awards_payload(id, name, embedded.clone(), "embedded"));
        }

        let direct = self
            .provider
            .get_entity_awards(id)
            .await
            .unwrap_or_else(log_as_empty);
        if !direct.is_empty() {
            return Ok(awards_payload(id, name, direct, "awards_endpoint"));
        }

        debug!(id, "awards endpoint empty; scanning catalog");
        let catalog = self
            .provider
            .get_awards_catalog()
            .await
            .unwrap_or_else(log_as_empty);
        let scanned = scan_awards_catalog(&catalog, id, name.as_deref());
        if !scanned.is_empty() {
            return Ok(awards_payload(id, name, scanned, "catalog"));
        }

        Err(HandlerError::Exhausted {
            message: match &name {
                Some(n) => format!("No award records found for '{n}'."),
                None => "No award records found for that series.".to_string(),
            },
            suggestions: vec![
                "The title may not have award data in the catalog".to_string(),
                "Try asking about a related movie's awards".to_string(),
            ],
        })
    }

    /// Awards for a movie named alongside a series conversation.
    pub(super) async fn get_related_media_awards(
        &self,
        params: &Params,
    ) -> Result<Value, HandlerError> {
        let name = media_name(params)
            .or_else(|| entity_name(params))
            .ok_or_else(|| {
                HandlerError::NotFound("Which movie's awards should I look up?".to_string())
            })?;
        let id = self.media_id_by_name(name).await?;
        let awards = self
            .provider
            .get_media_awards(id)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"media_id": id, "name": name, "awards": awards}))
    }

    pub(super) async fn advanced_search(&self, params: &Params) -> Result<Value, HandlerError> {
        let filters = filters_from_params(params);
        if filters.is_empty() {
            return Err(HandlerError::NotFound(
                "I need at least one search criterion (name, genre, year, network...)."
                    .to_string(),
            ));
        }
        let results = self
            .provider
            .advanced_search(&filters, SEARCH_LIMIT)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({
            "criteria": serde_json::to_value(params).unwrap_or(Value::Null),
            "results": results,
        }))
    }

    /// Character lookup inside a named series' cast list.
    pub(super) async fn get_character_details(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let character = params.get_str("character_name").ok_or_else(|| {
            HandlerError::NotFound("Which character are you asking about?".to_string())
        })?;
        if entity_name(params).is_none() && context.last_entities.is_empty() {
            return Err(HandlerError::Exhausted {
                message: format!("I need a series to look for '{character}' in."),
                suggestions: vec![format!("Try: tell me about {character} in <series name>")],
            });
        }
        let id = self
            .resolve_entity_id(params, context, "the character")
            .await?;
        let details = self
            .provider
            .get_entity_details(id)
            .await
            .map_err(|e| HandlerError::NotFound(e.to_string()))?;

        let wanted = character.to_lowercase();
        let hit = details["characters"].as_array().and_then(|cast| {
            cast.iter().find(|c| {
                c["name"]
                    .as_str()
                    .or_else(|| c["characterName"].as_str())
                    .is_some_and(|n| n.to_lowercase().contains(&wanted))
            })
        });

        match hit {
            Some(c) => Ok(json!({
                "series_id": id,
                "series_name": details["name"],
                "character": c,
            })),
            None => Err(HandlerError::NotFound(format!(
                "No character matching '{character}' in {}.",
                details["name"].as_str().unwrap_or("that series")
            ))),
        }
    }
}

fn awards_payload(id: i64, name: Option<String>, awards: Vec<Value>, source: &str) -> Value {
    json!({
        "series_id": id,
        "name": name,
        "awards": awards,
        "source": source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ParamValue;
    use crate::metadata::fixture::{series_record, FixtureProvider};
    use crate::metadata::MetadataProvider;

    fn dispatcher_with(f: FixtureProvider) -> Dispatcher {
        Dispatcher::new(MetadataProvider::Fixture(f))
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with(FixtureProvider::sample())
    }

    fn named(key: &str, value: &str) -> Params {
        let mut p = Params::new();
        p.insert(key, ParamValue::Str(value.into()));
        p
    }

    fn context_with(ids: Vec<i64>) -> ConversationContext {
        ConversationContext { last_entities: ids, ..Default::default() }
    }

    #[tokio::test]
    async fn search_by_name() {
        let out = dispatcher()
            .search_entity(&named("entity_name", "Breaking Bad"))
            .await
            .unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 1);
        assert!(out.get("fallback").is_none());
    }

    #[tokio::test]
    async fn search_falls_back_to_genre_query() {
        let mut p = named("entity_name", "Nonexistent Show");
        p.insert("genre", ParamValue::Str("Thriller".into()));
        let out = dispatcher().search_entity(&p).await.unwrap();
        assert!(!out["results"].as_array().unwrap().is_empty());
        assert_eq!(out["fallback"], "genre_query");
    }

    #[tokio::test]
    async fn search_without_criteria_errors() {
        let err = dispatcher().search_entity(&Params::new()).await.unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
    }

    #[tokio::test]
    async fn details_resolve_name_to_id() {
        let out = dispatcher()
            .get_entity_details(&named("entity_name", "severance"), &Default::default())
            .await
            .unwrap();
        assert_eq!(out["id"], 82912);
    }

    #[tokio::test]
    async fn similar_uses_conversation_context_when_unnamed() {
        let out = dispatcher()
            .get_similar_entities(&Params::new(), &context_with(vec![81189]))
            .await
            .unwrap();
        assert_eq!(out["origin_id"], 81189);
        assert!(!out["similar_entities"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn similar_without_name_or_context_errors() {
        let err = dispatcher()
            .get_similar_entities(&Params::new(), &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
    }

    #[tokio::test]
    async fn by_source_falls_back_to_search() {
        // "Severance" is not a network, but it is a series name.
        let out = dispatcher()
            .get_entities_by_source(&named("network", "Severance"))
            .await
            .unwrap();
        assert_eq!(out["fallback"], "search");
        assert!(!out["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn episodes_sorted_with_envelope() {
        let mut p = named("entity_name", "Breaking Bad");
        p.insert("season", ParamValue::Str("1".into()));
        let out = dispatcher()
            .get_entity_episodes(&p, &Default::default())
            .await
            .unwrap();
        assert_eq!(out["series_name"], "Breaking Bad");
        assert_eq!(out["season_number"], 1);
        assert_eq!(out["episodes_count"], 2);
        let eps = out["episodes"].as_array().unwrap();
        assert_eq!(eps[0]["number"], 1);
        assert_eq!(eps[1]["number"], 2);
    }

    #[tokio::test]
    async fn episodes_honor_alternate_field_names() {
        // Some endpoints emit episodeNumber/airedSeason instead of
        // number/seasonNumber; sort and season filter take either.
        let fixture = FixtureProvider::new()
            .with_series(vec![series_record(900, "Alt Fields", &["Drama"], "HBO", 2020)])
            .with_episodes(
                900,
                vec![
                    json!({"airedSeason": 1, "episodeNumber": 2, "name": "Second"}),
                    json!({"airedSeason": 1, "episodeNumber": 1, "name": "First"}),
                    json!({"airedSeason": 2, "episodeNumber": 1, "name": "Later"}),
                ],
            );
        let mut p = named("entity_name", "Alt Fields");
        p.insert("season", ParamValue::Int(1));
        let out = dispatcher_with(fixture)
            .get_entity_episodes(&p, &Default::default())
            .await
            .unwrap();
        assert_eq!(out["episodes_count"], 2);
        let eps = out["episodes"].as_array().unwrap();
        assert_eq!(eps[0]["name"], "First");
        assert_eq!(eps[1]["name"], "Second");
    }

    #[tokio::test]
    async fn episodes_missing_season_is_exhausted_with_suggestions() {
        let mut p = named("entity_name", "Breaking Bad");
        p.insert("season", ParamValue::Int(9));
        let err = dispatcher()
            .get_entity_episodes(&p, &Default::default())
            .await
            .unwrap_err();
        match err {
            HandlerError::Exhausted { suggestions, .. } => assert_eq!(suggestions.len(), 2),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn awards_prefers_embedded_then_endpoint_then_catalog() {
        // Sample carries endpoint awards for 81189.
        let out = dispatcher()
            .get_entity_awards(&named("entity_name", "Breaking Bad"), &Default::default())
            .await
            .unwrap();
        assert_eq!(out["source"], "awards_endpoint");

        // A series only mentioned in the catalog resolves at tier three.
        let f = FixtureProvider::new()
            .with_series(vec![series_record(70327, "The Wire", &["Drama"], "HBO", 2002)])
            .with_awards_catalog(vec![json!({
                "name": "Peabody Award",
                "records": [{"seriesId": 70327, "year": 2004}],
            })]);
        let out = dispatcher_with(f)
            .get_entity_awards(&named("entity_name", "The Wire"), &Default::default())
            .await
            .unwrap();
        assert_eq!(out["source"], "catalog");
        assert_eq!(out["awards"][0]["award"], "Peabody Award");
    }

    #[tokio::test]
    async fn awards_exhausted_when_all_tiers_empty() {
        let f = FixtureProvider::new().with_series(vec![series_record(
            1, "Obscure", &["Drama"], "CH4", 1999,
        )]);
        let err = dispatcher_with(f)
            .get_entity_awards(&named("entity_name", "Obscure"), &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn advanced_search_requires_criteria() {
        let err = dispatcher().advanced_search(&Params::new()).await.unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));

        let mut p = Params::new();
        p.insert("year", ParamValue::Int(1995));
        p.insert("kind", ParamValue::Str("movie".into()));
        let out = dispatcher().advanced_search(&p).await.unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 2); // Heat, Se7en
    }

    #[tokio::test]
    async fn character_lookup_scans_cast() {
        let mut series = series_record(81189, "Breaking Bad", &["Drama"], "AMC", 2008);
        series["characters"] = json!([
            {"name": "Walter White", "personName": "Bryan Cranston"},
            {"name": "Jesse Pinkman", "personName": "Aaron Paul"},
        ]);
        let f = FixtureProvider::new().with_series(vec![series]);
        let mut p = named("character_name", "jesse");
        p.insert("entity_name", ParamValue::Str("Breaking Bad".into()));
        let out = dispatcher_with(f)
            .get_character_details(&p, &Default::default())
            .await
            .unwrap();
        assert_eq!(out["character"]["personName"], "Aaron Paul");
    }

    #[tokio::test]
    async fn character_without_series_hint_is_exhausted() {
        let err = dispatcher()
            .get_character_details(&named("character_name", "Walter"), &Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Exhausted { .. }));
    }
}
