//! TVDB v4 REST client.
//!
//! Wraps the handful of endpoints the dispatch engine needs. Authentication
//! is a bearer token obtained from `/login` with the API key (plus an
//! optional subscriber PIN); the token is cached until shortly before its
//! one-month expiry and refreshed transparently, with a single retry on 401.
//!
//! All wire handling is private to this module — callers see `Value`
//! payloads and [`MetadataError`] only.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::{MetadataError, SearchFilters};

/// Refresh the cached token after 29 days; TVDB issues it for one month.
const TOKEN_LIFETIME_DAYS: i64 = 29;

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TvdbClient {
    client: Client,
    api_url: String,
    api_key: String,
    pin: Option<String>,
    token: Arc<Mutex<TokenState>>,
}

impl TvdbClient {
    pub fn new(
        api_url: String,
        api_key: String,
        pin: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| MetadataError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            pin,
            token: Arc::new(Mutex::new(TokenState::default())),
        })
    }

    // ── auth ──────────────────────────────────────────────────────────

    async fn ensure_token(&self) -> Result<String, MetadataError> {
        let mut state = self.token.lock().await;
        let expired = state
            .expires_at
            .is_none_or(|t| Utc::now() >= t);
        if state.token.is_none() || expired {
            let mut payload = json!({"apikey": self.api_key});
            if let Some(pin) = &self.pin {
                payload["pin"] = json!(pin);
            }
            let response = self
                .client
                .post(format!("{}/login", self.api_url))
                .json(&payload)
                .send()
                .await
                .map_err(|e| MetadataError::Transport(format!("login request failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!(%status, "TVDB authentication failed");
                return Err(MetadataError::Auth(format!("HTTP {status}: {body}")));
            }
            let body: Value = response
                .json()
                .await
                .map_err(|e| MetadataError::Auth(format!("malformed login response: {e}")))?;
            let token = body["data"]["token"]
                .as_str()
                .ok_or_else(|| MetadataError::Auth("login response missing token".into()))?
                .to_string();
            state.token = Some(token);
            state.expires_at = Some(Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS));
            debug!("TVDB token refreshed");
        }
        Ok(state.token.clone().unwrap_or_default())
    }

    async fn invalidate_token(&self) {
        let mut state = self.token.lock().await;
        state.token = None;
        state.expires_at = None;
    }

    // ── request plumbing ──────────────────────────────────────────────

    /// GET `endpoint` with bearer auth. A 401 invalidates the cached token
    /// and retries exactly once with a fresh login.
    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, MetadataError> {
        let mut response = self.send(endpoint, params).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!(endpoint, "TVDB 401 — refreshing token and retrying");
            self.invalidate_token().await;
            response = self.send(endpoint, params).await?;
        }
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Status {
                code: status.as_u16(),
                message: body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| MetadataError::Transport(format!("malformed response body: {e}")))
    }

    async fn send(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, MetadataError> {
        let token = self.ensure_token().await?;
        self.client
            .get(format!("{}{}", self.api_url, endpoint))
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))
    }

    fn data_list(body: Value) -> Vec<Value> {
        match body {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            Value::Array(items) => items,
            _ => Vec::new(),
        }
    }

    fn data_object(body: Value) -> Value {
        match body {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            other => other,
        }
    }

    // ── entity (series) operations ────────────────────────────────────

    pub async fn search_entities(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Value>, MetadataError> {
        let body = self
            .get("/search", &[("q", query.to_string()), ("type", "series".to_string())])
            .await?;
        let mut results = Self::data_list(body);
        apply_post_filters(&mut results, filters);
        results.truncate(limit);
        Ok(results)
    }

    pub async fn get_entity_details(&self, id: i64) -> Result<Value, MetadataError> {
        let body = self.get(&format!("/series/{id}/extended"), &[]).await?;
        Ok(Self::data_object(body))
    }

    pub async fn get_entity_episodes(
        &self,
        id: i64,
        season: Option<i64>,
    ) -> Result<Vec<Value>, MetadataError> {
        let body = self
            .get(&format!("/series/{id}/episodes/default"), &[])
            .await?;
        let mut episodes = match Self::data_object(body) {
            Value::Object(mut map) => match map.remove("episodes") {
                Some(Value::Array(eps)) => eps,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        if let Some(season) = season {
            episodes.retain(|e| {
                e["seasonNumber"].as_i64() == Some(season)
                    || e["airedSeason"].as_i64() == Some(season)
            });
        }
        Ok(episodes)
    }

    pub async fn get_entity_awards(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        let body = self.get(&format!("/series/{id}/awards"), &[]).await?;
        Ok(Self::data_list(body))
    }

    pub async fn get_awards_catalog(&self) -> Result<Vec<Value>, MetadataError> {
        let body = self.get("/awards", &[]).await?;
        Ok(Self::data_list(body))
    }

    /// No dedicated endpoint upstream: similar series are approximated by
    /// searching on the original's primary genre and dropping the original.
    pub async fn get_similar_entities(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        let details = self.get_entity_details(id).await?;
        let Some(primary_genre) = details["genres"]
            .as_array()
            .and_then(|gs| gs.first())
            .and_then(|g| g["name"].as_str())
            .map(str::to_string)
        else {
            return Ok(Vec::new());
        };
        let hits = self
            .search_entities(&primary_genre, 10, &SearchFilters::default())
            .await?;
        let similar: Vec<Value> = hits
            .into_iter()
            .filter(|s| !hit_has_id(s, id))
            .take(5)
            .collect();
        Ok(similar)
    }

    pub async fn get_entities_by_source(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<Value>, MetadataError> {
        // Resolve the network ID from the catalog first, then list series.
        let networks = Self::data_list(self.get("/networks", &[]).await?);
        let want = name.to_lowercase();
        let Some(network_id) = networks.iter().find_map(|n| {
            n["name"]
                .as_str()
                .filter(|nm| nm.to_lowercase().contains(&want))
                .and_then(|_| n["id"].as_i64())
        }) else {
            return Ok(Vec::new());
        };
        let body = self
            .get(
                "/series",
                &[
                    ("network", network_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(Self::data_list(body))
    }

    pub async fn advanced_search(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Value>, MetadataError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = &filters.query {
            params.push(("q", q.clone()));
        }
        if let Some(kind) = &filters.kind {
            params.push(("type", kind.clone()));
        }
        if let Some(year) = filters.year {
            params.push(("year", year.to_string()));
        }
        for (key, field) in [
            ("country", &filters.country),
            ("company", &filters.company),
            ("director", &filters.director),
            ("language", &filters.language),
            ("network", &filters.network),
            ("primaryType", &filters.primary_type),
            ("remote_id", &filters.remote_id),
        ] {
            if let Some(v) = field {
                params.push((key, v.clone()));
            }
        }
        params.push(("limit", limit.to_string()));
        let body = self.get("/search", &params).await?;
        let mut results = Self::data_list(body);
        results.truncate(limit);
        Ok(results)
    }

    pub async fn get_upcoming_entities(
        &self,
        genre: Option<&str>,
    ) -> Result<Vec<Value>, MetadataError> {
        let query = genre.unwrap_or("series").to_string();
        let body = self
            .get("/search", &[("q", query), ("type", "series".to_string())])
            .await?;
        let mut results = Self::data_list(body);
        results.retain(|s| {
            s["status"]
                .as_str()
                .is_some_and(|st| st.to_lowercase().contains("upcoming"))
        });
        Ok(results)
    }

    pub async fn get_next_release(&self, id: i64) -> Result<Value, MetadataError> {
        let body = self.get(&format!("/series/{id}"), &[]).await?;
        let series = Self::data_object(body);
        Ok(json!({
            "series_id": id,
            "name": series["name"],
            "nextAired": series.get("nextAired").cloned().unwrap_or(Value::Null),
        }))
    }

    pub async fn get_entity_artwork(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        let body = self.get(&format!("/series/{id}/artworks"), &[]).await?;
        match Self::data_object(body) {
            Value::Object(mut map) => match map.remove("artworks") {
                Some(Value::Array(items)) => Ok(items),
                _ => Ok(Vec::new()),
            },
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn get_person_credits(&self, name: &str) -> Result<Vec<Value>, MetadataError> {
        let body = self
            .get("/search", &[("q", name.to_string()), ("type", "people".to_string())])
            .await?;
        let people = Self::data_list(body);
        let Some(person_id) = people.first().and_then(extract_numeric_id) else {
            return Ok(Vec::new());
        };
        let body = self
            .get(&format!("/people/{person_id}/extended"), &[])
            .await?;
        match Self::data_object(body) {
            Value::Object(mut map) => match map.remove("characters") {
                Some(Value::Array(items)) => Ok(items),
                _ => Ok(Vec::new()),
            },
            _ => Ok(Vec::new()),
        }
    }

    // ── media (movie) operations ──────────────────────────────────────

    pub async fn search_media(&self, query: &str, limit: usize) -> Result<Vec<Value>, MetadataError> {
        let body = self
            .get("/search", &[("q", query.to_string()), ("type", "movie".to_string())])
            .await?;
        let mut results = Self::data_list(body);
        results.truncate(limit);
        Ok(results)
    }

    pub async fn get_media_details(&self, id: i64) -> Result<Value, MetadataError> {
        let body = self.get(&format!("/movies/{id}/extended"), &[]).await?;
        Ok(Self::data_object(body))
    }

    pub async fn get_similar_media(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        let details = self.get_media_details(id).await?;
        let Some(primary_genre) = details["genres"]
            .as_array()
            .and_then(|gs| gs.first())
            .and_then(|g| g["name"].as_str())
            .map(str::to_string)
        else {
            return Ok(Vec::new());
        };
        let hits = self.search_media(&primary_genre, 10).await?;
        Ok(hits.into_iter().filter(|m| !hit_has_id(m, id)).take(5).collect())
    }

    pub async fn get_media_by_person(&self, name: &str) -> Result<Vec<Value>, MetadataError> {
        let credits = self.get_person_credits(name).await?;
        Ok(credits
            .into_iter()
            .filter(|c| c["movieId"].as_i64().is_some() || c["movie"].is_object())
            .collect())
    }

    pub async fn get_media_awards(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        let body = self.get(&format!("/movies/{id}/awards"), &[]).await?;
        Ok(Self::data_list(body))
    }

    pub async fn get_trending_media(&self, genre: Option<&str>) -> Result<Vec<Value>, MetadataError> {
        let body = self.get("/movies", &[("sort", "score".to_string())]).await?;
        let mut results = Self::data_list(body);
        if let Some(g) = genre {
            let want = g.to_lowercase();
            results.retain(|m| {
                m["genres"].as_array().is_some_and(|gs| {
                    gs.iter()
                        .any(|x| x["name"].as_str().is_some_and(|n| n.to_lowercase() == want))
                })
            });
        }
        results.truncate(10);
        Ok(results)
    }

    pub async fn recommend_media(&self, filters: &SearchFilters) -> Result<Vec<Value>, MetadataError> {
        // Criteria search: use the strongest criterion as the query, then
        // post-filter the rest client-side.
        let query = filters
            .query
            .clone()
            .or_else(|| filters.genres.first().cloned())
            .or_else(|| filters.people.first().cloned());
        let Some(query) = query else {
            return Ok(Vec::new());
        };
        let mut results = self.search_media(&query, 20).await?;
        if let Some(year) = filters.year {
            results.retain(|m| m["year"].as_i64() == Some(year));
        }
        for genre in &filters.genres {
            let want = genre.to_lowercase();
            results.retain(|m| {
                m["genres"].as_array().is_none_or(|gs| {
                    gs.iter()
                        .any(|x| x["name"].as_str().is_some_and(|n| n.to_lowercase() == want))
                })
            });
        }
        results.truncate(10);
        Ok(results)
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

/// True when a search hit's ID — bare integer or `"<kind>-<digits>"` — names `id`.
fn hit_has_id(hit: &Value, id: i64) -> bool {
    extract_numeric_id(hit) == Some(id)
}

fn extract_numeric_id(record: &Value) -> Option<i64> {
    match &record["id"] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s
            .rsplit_once('-')
            .map(|(_, digits)| digits)
            .unwrap_or(s)
            .parse()
            .ok(),
        _ => None,
    }
}

/// Client-side narrowing the search endpoint cannot express.
fn apply_post_filters(results: &mut Vec<Value>, filters: &SearchFilters) {
    if let Some(year) = filters.year {
        results.retain(|s| {
            s["year"].as_i64() == Some(year)
                || s["year"].as_str().and_then(|y| y.parse::<i64>().ok()) == Some(year)
        });
    }
    if let Some(country) = &filters.country {
        let want = country.to_lowercase();
        results.retain(|s| {
            s["country"]
                .as_str()
                .is_some_and(|c| c.to_lowercase().contains(&want))
        });
    }
    if let Some(network) = &filters.network {
        let want = network.to_lowercase();
        results.retain(|s| {
            s["network"]
                .as_str()
                .is_some_and(|n| n.to_lowercase().contains(&want))
        });
    }
    if let Some(status) = &filters.status {
        let want = status.to_lowercase();
        results.retain(|s| {
            s["status"]
                .as_str()
                .is_some_and(|st| st.to_lowercase().contains(&want))
        });
    }
    // Genre narrowing is lenient: hits without genre data survive, since
    // the search endpoint often omits it.
    for genre in &filters.genres {
        let want = genre.to_lowercase();
        results.retain(|s| {
            s["genres"].as_array().is_none_or(|gs| {
                gs.iter().any(|g| {
                    g["name"]
                        .as_str()
                        .or_else(|| g.as_str())
                        .is_some_and(|n| n.to_lowercase() == want)
                })
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_numeric_id_handles_all_shapes() {
        assert_eq!(extract_numeric_id(&json!({"id": 81189})), Some(81189));
        assert_eq!(extract_numeric_id(&json!({"id": "81189"})), Some(81189));
        assert_eq!(extract_numeric_id(&json!({"id": "series-81189"})), Some(81189));
        assert_eq!(extract_numeric_id(&json!({"id": "series-abc"})), None);
        assert_eq!(extract_numeric_id(&json!({})), None);
    }

    #[test]
    fn post_filters_narrow_results() {
        let mut results = vec![
            json!({"name": "a", "year": 2008, "network": "AMC", "status": "Ended"}),
            json!({"name": "b", "year": 2015, "network": "HBO", "status": "Continuing"}),
        ];
        apply_post_filters(
            &mut results,
            &SearchFilters { year: Some(2008), ..Default::default() },
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "a");
    }

    #[test]
    fn year_as_string_still_matches() {
        let mut results = vec![json!({"name": "a", "year": "2008"})];
        apply_post_filters(
            &mut results,
            &SearchFilters { year: Some(2008), ..Default::default() },
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn data_list_unwraps_envelope() {
        let body = json!({"data": [{"id": 1}, {"id": 2}]});
        assert_eq!(TvdbClient::data_list(body).len(), 2);
        assert!(TvdbClient::data_list(json!({"data": null})).is_empty());
        assert!(TvdbClient::data_list(json!("oops")).is_empty());
    }
}
