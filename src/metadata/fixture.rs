//! In-memory metadata fixture — scripted catalog for tests and offline runs.
//!
//! Serves the same operation surface as the TVDB client from hand-built
//! records. Per-operation switches force empty results or transport errors
//! so fallback ladders can be exercised deterministically.
//!
//! Search results deliberately carry prefixed string IDs (`"series-81189"`)
//! while detail records carry bare integers — the same mixed shapes the real
//! API produces, so ID normalization stays honest.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};

use super::{MetadataError, SearchFilters};

#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    series: Vec<Value>,
    movies: Vec<Value>,
    episodes: HashMap<i64, Vec<Value>>,
    awards: HashMap<i64, Vec<Value>>,
    catalog: Vec<Value>,
    trending: Vec<Value>,
    upcoming: Vec<Value>,
    artwork: HashMap<i64, Vec<Value>>,
    empty_ops: HashSet<&'static str>,
    failing_ops: HashSet<&'static str>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small built-in catalog, enough for an offline conversation.
    pub fn sample() -> Self {
        let series = vec![
            series_record(81189, "Breaking Bad", &["Drama", "Crime"], "AMC", 2008),
            series_record(79501, "Better Call Saul", &["Drama", "Crime"], "AMC", 2015),
            series_record(70327, "The Wire", &["Drama", "Crime"], "HBO", 2002),
            series_record(82912, "Severance", &["Drama", "Thriller"], "Apple TV+", 2022),
            series_record(75003, "Dark", &["Sci-Fi", "Thriller"], "Netflix", 2017),
        ];
        let movies = vec![
            movie_record(335, "Heat", &["Crime", "Thriller"], 1995),
            movie_record(807, "Se7en", &["Crime", "Thriller"], 1995),
            movie_record(27205, "Inception", &["Sci-Fi", "Thriller"], 2010),
        ];
        let mut episodes = HashMap::new();
        episodes.insert(
            81189,
            vec![
                episode_record(1, 1, "Pilot", "2008-01-20"),
                episode_record(1, 2, "Cat's in the Bag...", "2008-01-27"),
                episode_record(2, 1, "Seven Thirty-Seven", "2009-03-08"),
            ],
        );
        let mut awards = HashMap::new();
        awards.insert(
            81189,
            vec![json!({"name": "Primetime Emmy", "category": "Outstanding Drama Series", "isWinner": true})],
        );
        Self {
            trending: movies.clone(),
            series,
            movies,
            episodes,
            awards,
            ..Self::default()
        }
    }

    // ── builders ──────────────────────────────────────────────────────

    pub fn with_series(mut self, series: Vec<Value>) -> Self {
        self.series = series;
        self
    }

    pub fn with_movies(mut self, movies: Vec<Value>) -> Self {
        self.movies = movies;
        self
    }

    pub fn with_episodes(mut self, id: i64, episodes: Vec<Value>) -> Self {
        self.episodes.insert(id, episodes);
        self
    }

    pub fn with_awards(mut self, id: i64, awards: Vec<Value>) -> Self {
        self.awards.insert(id, awards);
        self
    }

    pub fn with_awards_catalog(mut self, catalog: Vec<Value>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_trending(mut self, trending: Vec<Value>) -> Self {
        self.trending = trending;
        self
    }

    pub fn with_upcoming(mut self, upcoming: Vec<Value>) -> Self {
        self.upcoming = upcoming;
        self
    }

    pub fn with_artwork(mut self, id: i64, artwork: Vec<Value>) -> Self {
        self.artwork.insert(id, artwork);
        self
    }

    /// Force the named operation to return empty results.
    pub fn force_empty(mut self, op: &'static str) -> Self {
        self.empty_ops.insert(op);
        self
    }

    /// Force the named operation to fail with a transport error.
    pub fn force_error(mut self, op: &'static str) -> Self {
        self.failing_ops.insert(op);
        self
    }

    fn gate(&self, op: &'static str) -> Result<bool, MetadataError> {
        if self.failing_ops.contains(op) {
            return Err(MetadataError::Transport(format!("fixture: forced error for {op}")));
        }
        Ok(self.empty_ops.contains(op))
    }

    // ── entity operations ─────────────────────────────────────────────

    pub fn search_entities(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Value>, MetadataError> {
        if self.gate("search_entities")? {
            return Ok(Vec::new());
        }
        let q = query.to_lowercase();
        let results = self
            .series
            .iter()
            .filter(|s| name_matches(s, &q) || genre_matches(s, &q))
            .filter(|s| passes_filters(s, filters))
            .take(limit)
            .map(as_search_hit)
            .collect();
        Ok(results)
    }

    pub fn get_entity_details(&self, id: i64) -> Result<Value, MetadataError> {
        if self.gate("get_entity_details")? {
            return Err(MetadataError::Status { code: 404, message: format!("series {id} not found") });
        }
        self.series
            .iter()
            .find(|s| s["id"].as_i64() == Some(id))
            .cloned()
            .ok_or(MetadataError::Status { code: 404, message: format!("series {id} not found") })
    }

    pub fn get_entity_episodes(&self, id: i64, season: Option<i64>) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_entity_episodes")? {
            return Ok(Vec::new());
        }
        let mut eps = self.episodes.get(&id).cloned().unwrap_or_default();
        if let Some(season) = season {
            eps.retain(|e| {
                e["seasonNumber"].as_i64() == Some(season) || e["airedSeason"].as_i64() == Some(season)
            });
        }
        Ok(eps)
    }

    pub fn get_entity_awards(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_entity_awards")? {
            return Ok(Vec::new());
        }
        Ok(self.awards.get(&id).cloned().unwrap_or_default())
    }

    pub fn get_awards_catalog(&self) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_awards_catalog")? {
            return Ok(Vec::new());
        }
        Ok(self.catalog.clone())
    }

    pub fn get_similar_entities(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_similar_entities")? {
            return Ok(Vec::new());
        }
        let Some(origin) = self.series.iter().find(|s| s["id"].as_i64() == Some(id)) else {
            return Ok(Vec::new());
        };
        let origin_genres = genre_names(origin);
        let similar = self
            .series
            .iter()
            .filter(|s| s["id"].as_i64() != Some(id))
            .filter(|s| genre_names(s).iter().any(|g| origin_genres.contains(g)))
            .take(5)
            .map(as_search_hit)
            .collect();
        Ok(similar)
    }

    pub fn get_entities_by_source(&self, name: &str, limit: usize) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_entities_by_source")? {
            return Ok(Vec::new());
        }
        let n = name.to_lowercase();
        Ok(self
            .series
            .iter()
            .filter(|s| {
                s["network"]
                    .as_str()
                    .is_some_and(|net| net.to_lowercase().contains(&n))
            })
            .take(limit)
            .map(as_search_hit)
            .collect())
    }

    pub fn advanced_search(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<Value>, MetadataError> {
        if self.gate("advanced_search")? {
            return Ok(Vec::new());
        }
        let q = filters.query.as_deref().unwrap_or("").to_lowercase();
        let pool: Vec<&Value> = match filters.kind.as_deref() {
            Some("movie") => self.movies.iter().collect(),
            Some("series") => self.series.iter().collect(),
            _ => self.series.iter().chain(self.movies.iter()).collect(),
        };
        Ok(pool
            .into_iter()
            .filter(|r| q.is_empty() || name_matches(r, &q))
            .filter(|r| passes_filters(r, filters))
            .take(limit)
            .map(as_search_hit)
            .collect())
    }

    pub fn get_upcoming_entities(&self, genre: Option<&str>) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_upcoming_entities")? {
            return Ok(Vec::new());
        }
        let mut upcoming = self.upcoming.clone();
        if let Some(g) = genre {
            let g = g.to_lowercase();
            upcoming.retain(|s| genre_matches(s, &g));
        }
        Ok(upcoming)
    }

    pub fn get_next_release(&self, id: i64) -> Result<Value, MetadataError> {
        if self.gate("get_next_release")? {
            return Err(MetadataError::Status { code: 404, message: format!("series {id} not found") });
        }
        let series = self.get_entity_details(id)?;
        Ok(json!({
            "series_id": id,
            "name": series["name"],
            "nextAired": series.get("nextAired").cloned().unwrap_or(Value::Null),
        }))
    }

    pub fn get_entity_artwork(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_entity_artwork")? {
            return Ok(Vec::new());
        }
        Ok(self.artwork.get(&id).cloned().unwrap_or_default())
    }

    pub fn get_person_credits(&self, name: &str) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_person_credits")? {
            return Ok(Vec::new());
        }
        let n = name.to_lowercase();
        Ok(self
            .series
            .iter()
            .chain(self.movies.iter())
            .filter(|r| {
                r["characters"].as_array().is_some_and(|cast| {
                    cast.iter().any(|c| {
                        c["personName"]
                            .as_str()
                            .is_some_and(|p| p.to_lowercase().contains(&n))
                    })
                })
            })
            .map(as_search_hit)
            .collect())
    }

    // ── media operations ──────────────────────────────────────────────

    pub fn search_media(&self, query: &str, limit: usize) -> Result<Vec<Value>, MetadataError> {
        if self.gate("search_media")? {
            return Ok(Vec::new());
        }
        let q = query.to_lowercase();
        Ok(self
            .movies
            .iter()
            .filter(|m| name_matches(m, &q) || genre_matches(m, &q))
            .take(limit)
            .map(as_media_hit)
            .collect())
    }

    pub fn get_media_details(&self, id: i64) -> Result<Value, MetadataError> {
        if self.gate("get_media_details")? {
            return Err(MetadataError::Status { code: 404, message: format!("movie {id} not found") });
        }
        self.movies
            .iter()
            .find(|m| m["id"].as_i64() == Some(id))
            .cloned()
            .ok_or(MetadataError::Status { code: 404, message: format!("movie {id} not found") })
    }

    pub fn get_similar_media(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_similar_media")? {
            return Ok(Vec::new());
        }
        let Some(origin) = self.movies.iter().find(|m| m["id"].as_i64() == Some(id)) else {
            return Ok(Vec::new());
        };
        let origin_genres = genre_names(origin);
        Ok(self
            .movies
            .iter()
            .filter(|m| m["id"].as_i64() != Some(id))
            .filter(|m| genre_names(m).iter().any(|g| origin_genres.contains(g)))
            .take(5)
            .map(as_media_hit)
            .collect())
    }

    pub fn get_media_by_person(&self, name: &str) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_media_by_person")? {
            return Ok(Vec::new());
        }
        let n = name.to_lowercase();
        Ok(self
            .movies
            .iter()
            .filter(|m| {
                let in_cast = m["characters"].as_array().is_some_and(|cast| {
                    cast.iter().any(|c| {
                        c["personName"]
                            .as_str()
                            .is_some_and(|p| p.to_lowercase().contains(&n))
                    })
                });
                let directed = m["director"]
                    .as_str()
                    .is_some_and(|d| d.to_lowercase().contains(&n));
                in_cast || directed
            })
            .map(as_media_hit)
            .collect())
    }

    pub fn get_media_awards(&self, id: i64) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_media_awards")? {
            return Ok(Vec::new());
        }
        Ok(self.awards.get(&id).cloned().unwrap_or_default())
    }

    pub fn get_trending_media(&self, genre: Option<&str>) -> Result<Vec<Value>, MetadataError> {
        if self.gate("get_trending_media")? {
            return Ok(Vec::new());
        }
        let mut trending = self.trending.clone();
        if let Some(g) = genre {
            let g = g.to_lowercase();
            trending.retain(|m| genre_matches(m, &g));
        }
        Ok(trending)
    }

    pub fn recommend_media(&self, filters: &SearchFilters) -> Result<Vec<Value>, MetadataError> {
        if self.gate("recommend_media")? {
            return Ok(Vec::new());
        }
        Ok(self
            .movies
            .iter()
            .filter(|m| passes_filters(m, filters))
            .map(as_media_hit)
            .collect())
    }
}

// ── record builders ───────────────────────────────────────────────────────────

pub fn series_record(id: i64, name: &str, genres: &[&str], network: &str, year: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "year": year,
        "network": network,
        "status": "Ended",
        "overview": format!("{name} — a {network} original."),
        "genres": genres.iter().map(|g| json!({"name": g})).collect::<Vec<_>>(),
        "characters": [],
    })
}

pub fn movie_record(id: i64, name: &str, genres: &[&str], year: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "year": year,
        "overview": format!("{name} ({year})."),
        "genres": genres.iter().map(|g| json!({"name": g})).collect::<Vec<_>>(),
        "characters": [],
    })
}

pub fn episode_record(season: i64, number: i64, name: &str, aired: &str) -> Value {
    json!({
        "seasonNumber": season,
        "number": number,
        "name": name,
        "aired": aired,
        "overview": "",
    })
}

// ── matching helpers ──────────────────────────────────────────────────────────

fn name_matches(record: &Value, query_lower: &str) -> bool {
    record["name"]
        .as_str()
        .is_some_and(|n| n.to_lowercase().contains(query_lower))
}

fn genre_matches(record: &Value, query_lower: &str) -> bool {
    genre_names(record)
        .iter()
        .any(|g| g.to_lowercase() == query_lower)
}

fn genre_names(record: &Value) -> Vec<String> {
    record["genres"]
        .as_array()
        .map(|gs| {
            gs.iter()
                .filter_map(|g| g["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn passes_filters(record: &Value, filters: &SearchFilters) -> bool {
    if let Some(year) = filters.year {
        if record["year"].as_i64() != Some(year) {
            return false;
        }
    }
    if let Some(network) = &filters.network {
        let want = network.to_lowercase();
        if !record["network"]
            .as_str()
            .is_some_and(|n| n.to_lowercase().contains(&want))
        {
            return false;
        }
    }
    if let Some(status) = &filters.status {
        let want = status.to_lowercase();
        if !record["status"]
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&want))
        {
            return false;
        }
    }
    if let Some(country) = &filters.country {
        let want = country.to_lowercase();
        if !record["country"]
            .as_str()
            .is_some_and(|c| c.to_lowercase().contains(&want))
        {
            return false;
        }
    }
    // Every requested genre must be present.
    filters
        .genres
        .iter()
        .all(|g| genre_matches(record, &g.to_lowercase()))
}

/// Search hits carry the API's composite string ID form.
fn as_search_hit(record: &Value) -> Value {
    let mut hit = record.clone();
    if let Some(id) = record["id"].as_i64() {
        hit["id"] = json!(format!("series-{id}"));
    }
    hit
}

fn as_media_hit(record: &Value) -> Value {
    let mut hit = record.clone();
    if let Some(id) = record["id"].as_i64() {
        hit["id"] = json!(format!("movie-{id}"));
    }
    hit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_name_case_insensitive() {
        let f = FixtureProvider::sample();
        let hits = f.search_entities("breaking bad", 10, &SearchFilters::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], "series-81189");
    }

    #[test]
    fn search_matches_genre_as_query() {
        let f = FixtureProvider::sample();
        let hits = f.search_entities("Crime", 10, &SearchFilters::default()).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn similar_excludes_origin_and_shares_genre() {
        let f = FixtureProvider::sample();
        let similar = f.get_similar_entities(81189).unwrap();
        assert!(!similar.is_empty());
        assert!(similar.iter().all(|s| s["id"] != "series-81189"));
    }

    #[test]
    fn episodes_filter_by_season() {
        let f = FixtureProvider::sample();
        let s1 = f.get_entity_episodes(81189, Some(1)).unwrap();
        assert_eq!(s1.len(), 2);
        let all = f.get_entity_episodes(81189, None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn forced_empty_and_error() {
        let f = FixtureProvider::sample()
            .force_empty("search_entities")
            .force_error("get_trending_media");
        assert!(f.search_entities("Breaking Bad", 10, &SearchFilters::default()).unwrap().is_empty());
        assert!(f.get_trending_media(None).is_err());
    }

    #[test]
    fn recommend_requires_all_genres() {
        let f = FixtureProvider::sample();
        let filters = SearchFilters {
            genres: vec!["Crime".into(), "Thriller".into()],
            ..Default::default()
        };
        let recs = f.recommend_media(&filters).unwrap();
        assert_eq!(recs.len(), 2); // Heat, Se7en
        let none = f.recommend_media(&SearchFilters {
            genres: vec!["Western".into()],
            ..Default::default()
        });
        assert!(none.unwrap().is_empty());
    }

    #[test]
    fn details_unknown_id_is_status_error() {
        let f = FixtureProvider::sample();
        assert!(matches!(
            f.get_entity_details(999_999),
            Err(MetadataError::Status { code: 404, .. })
        ));
    }
}
