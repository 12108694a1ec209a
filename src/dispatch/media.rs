//! Movie-side intent handlers, including the recommendation fallback ladder.

use serde_json::{json, Value};
use tracing::debug;

use crate::intent::{ConversationContext, Params};
use crate::metadata::SearchFilters;

use super::{
    filters_from_params, log_as_empty, media_name, normalize_id, person_name, Dispatcher,
    HandlerError, SEARCH_LIMIT,
};

impl Dispatcher {
    pub(super) async fn search_media(&self, params: &Params) -> Result<Value, HandlerError> {
        let query = media_name(params)
            .or_else(|| params.get_str("query"))
            .or_else(|| params.get_str("genre"))
            .ok_or_else(|| {
                HandlerError::NotFound("I need a movie name or a genre to search for.".to_string())
            })?;
        let results = self
            .provider
            .search_media(query, SEARCH_LIMIT)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"query": query, "results": results}))
    }

    pub(super) async fn get_media_details(&self, params: &Params) -> Result<Value, HandlerError> {
        let id = self.resolve_media_id(params).await?;
        self.provider
            .get_media_details(id)
            .await
            .map_err(|e| HandlerError::NotFound(e.to_string()))
    }

    pub(super) async fn get_similar_media(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let id = match media_name(params) {
            Some(name) => self.media_id_by_name(name).await?,
            None => match context.last_entities.first() {
                Some(id) => *id,
                None => {
                    return Err(HandlerError::NotFound(
                        "Which movie should I find similar titles for?".to_string(),
                    ))
                }
            },
        };
        let similar = self
            .provider
            .get_similar_media(id)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"origin_id": id, "similar_media": similar}))
    }

    pub(super) async fn get_media_by_person(&self, params: &Params) -> Result<Value, HandlerError> {
        let name = person_name(params).ok_or_else(|| {
            HandlerError::NotFound("Whose movies should I look up?".to_string())
        })?;
        let media = self
            .provider
            .get_media_by_person(name)
            .await
            .unwrap_or_else(log_as_empty);
        Ok(json!({"person": name, "media": media}))
    }

    /// Awards for a movie: embedded in the detail record, then the awards
    /// endpoint, then the global catalog.
    pub(super) async fn get_media_awards(&self, params: &Params) -> Result<Value, HandlerError> {
        let id = self.resolve_media_id(params).await?;

        let details = self.provider.get_media_details(id).await.ok();
        let name = details
            .as_ref()
            .and_then(|d| d["name"].as_str().map(str::to_string));

        if let Some(embedded) = details
            .as_ref()
            .and_then(|d| d["awards"].as_array())
            .filter(|a| !a.is_empty())
        {
            return Ok(json!({
                "media_id": id, "name": name, "awards": embedded, "source": "embedded",
            }));
        }

        let direct = self
            .provider
            .get_media_awards(id)
            .await
            .unwrap_or_else(log_as_empty);
        if !direct.is_empty() {
            return Ok(json!({
                "media_id": id, "name": name, "awards": direct, "source": "awards_endpoint",
            }));
        }

        let catalog = self
            .provider
            .get_awards_catalog()
            .await
            .unwrap_or_else(log_as_empty);
        let scanned = super::scan_awards_catalog(&catalog, id, name.as_deref());
        if !scanned.is_empty() {
            return Ok(json!({
                "media_id": id, "name": name, "awards": scanned, "source": "catalog",
            }));
        }

        Err(HandlerError::Exhausted {
            message: match &name {
                Some(n) => format!("No award records found for '{n}'."),
                None => "No award records found for that movie.".to_string(),
            },
            suggestions: vec!["The title may not have award data in the catalog".to_string()],
        })
    }

    /// Trending ladder: genre-filtered trending, unfiltered trending, then a
    /// broad popular search. Each degradation carries a note; when every rung
    /// is empty the user gets suggestions instead of a bare empty list.
    pub(super) async fn get_trending_media(&self, params: &Params) -> Result<Value, HandlerError> {
        let genre = params.get_str("genre");
        let mut trending = self
            .provider
            .get_trending_media(genre)
            .await
            .unwrap_or_else(log_as_empty);

        let mut note = None;
        if trending.is_empty() {
            if let Some(g) = genre {
                trending = self
                    .provider
                    .get_trending_media(None)
                    .await
                    .unwrap_or_else(log_as_empty);
                if !trending.is_empty() {
                    note = Some(format!("No trending titles matched '{g}'; showing overall trending."));
                }
            }
        }
        if trending.is_empty() {
            trending = self
                .provider
                .search_media("popular", SEARCH_LIMIT)
                .await
                .unwrap_or_else(log_as_empty);
            if !trending.is_empty() {
                note = Some("Trending data is unavailable; showing popular titles instead.".to_string());
            }
        }
        if trending.is_empty() {
            return Err(HandlerError::Exhausted {
                message: "No trending titles are available right now.".to_string(),
                suggestions: vec![
                    "Try searching for a specific title".to_string(),
                    "Ask for a recommendation by genre".to_string(),
                ],
            });
        }

        let mut payload = json!({"trending_media": trending});
        if let Some(g) = genre {
            payload["genre"] = json!(g);
        }
        if let Some(n) = note {
            payload["note"] = json!(n);
        }
        Ok(payload)
    }

    /// Recommendation ladder. Rungs, first non-empty wins:
    /// 1. all criteria together;
    /// 2. each criterion alone (genres first, then people);
    /// 3. trending;
    /// 4. broad keyword search;
    /// 5. give up with suggestions.
    /// Stored preferences step in only when the request itself names no
    /// criteria — an explicit ask is never diluted.
    pub(super) async fn recommend_media(
        &self,
        params: &Params,
        context: &ConversationContext,
    ) -> Result<Value, HandlerError> {
        let mut filters = filters_from_params(params);
        filters.query = None;

        let explicit = !filters.genres.is_empty() || !filters.people.is_empty();
        if !explicit {
            filters.genres = context.preferences.favorite_genres.clone();
            filters.people = context.preferences.favorite_people.clone();
        }

        // Rung 1: everything at once.
        if !filters.is_empty() {
            let recs = self
                .provider
                .recommend_media(&filters)
                .await
                .unwrap_or_else(log_as_empty);
            if !recs.is_empty() {
                return Ok(recommendation_payload(recs, "criteria", None));
            }

            // Rung 2: one criterion at a time.
            for genre in &filters.genres {
                let single = SearchFilters { genres: vec![genre.clone()], ..Default::default() };
                let recs = self
                    .provider
                    .recommend_media(&single)
                    .await
                    .unwrap_or_else(log_as_empty);
                if !recs.is_empty() {
                    debug!(criterion = %genre, "recommendation matched on single genre");
                    return Ok(recommendation_payload(recs, "single_criterion", Some(genre)));
                }
            }
            for person in &filters.people {
                let recs = self
                    .provider
                    .get_media_by_person(person)
                    .await
                    .unwrap_or_else(log_as_empty);
                if !recs.is_empty() {
                    return Ok(recommendation_payload(recs, "single_criterion", Some(person)));
                }
            }
        }

        // Rung 3: trending.
        let trending = self
            .provider
            .get_trending_media(None)
            .await
            .unwrap_or_else(log_as_empty);
        if !trending.is_empty() {
            return Ok(recommendation_payload(trending, "trending", None));
        }

        // Rung 4: broad keyword search.
        let keyword = filters
            .genres
            .first()
            .map(String::as_str)
            .unwrap_or("popular");
        let broad = self
            .provider
            .search_media(keyword, SEARCH_LIMIT)
            .await
            .unwrap_or_else(log_as_empty);
        if !broad.is_empty() {
            return Ok(recommendation_payload(broad, "keyword_search", Some(keyword)));
        }

        Err(HandlerError::Exhausted {
            message: "I couldn't find anything to recommend right now.".to_string(),
            suggestions: vec![
                "Try naming a genre you're in the mood for".to_string(),
                "Ask for movies like one you already enjoyed".to_string(),
            ],
        })
    }

    /// Media ID from an explicit ID parameter or a name search. The
    /// last-entity-context is deliberately not consulted here.
    async fn resolve_media_id(&self, params: &Params) -> Result<i64, HandlerError> {
        if let Some(raw) = params.get("media_id").or_else(|| params.get("id")) {
            let raw = serde_json::to_value(raw).unwrap_or(Value::Null);
            return normalize_id(&raw);
        }
        match media_name(params) {
            Some(name) => self.media_id_by_name(name).await,
            None => Err(HandlerError::NotFound(
                "Which movie do you mean? Please name one.".to_string(),
            )),
        }
    }
}

fn recommendation_payload(recs: Vec<Value>, strategy: &str, criterion: Option<&str>) -> Value {
    let mut payload = json!({"recommended_media": recs, "strategy": strategy});
    if let Some(c) = criterion {
        payload["criterion"] = json!(c);
    }
    payload
}
