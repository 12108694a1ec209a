//! Metadata provider abstraction.
//!
//! `MetadataProvider` is an enum over concrete backends: the TVDB v4 REST
//! client and an in-memory fixture used by tests and offline runs. Enum
//! dispatch avoids `dyn` trait objects and the `async-trait` dependency;
//! adding a backend = new module + new variant + new arms.
//!
//! Contract every backend upholds: list-returning operations yield an empty
//! `Vec` for "no results" — they never error for that case. Errors mean the
//! upstream was genuinely unavailable (transport, auth, non-2xx), and the
//! dispatch engine treats them as empty results for fallback purposes.

pub mod fixture;
pub mod tvdb;

use serde_json::Value;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Transport(String),

    #[error("metadata API error ({code}): {message}")]
    Status { code: u16, message: String },

    #[error("metadata authentication failed: {0}")]
    Auth(String),
}

// ── Search filters ────────────────────────────────────────────────────────────

/// Optional narrowing criteria shared by search and recommendation calls.
/// Unset fields are simply not applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub kind: Option<String>,
    pub year: Option<i64>,
    pub country: Option<String>,
    pub network: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub people: Vec<String>,
    pub company: Option<String>,
    pub director: Option<String>,
    pub language: Option<String>,
    pub primary_type: Option<String>,
    pub remote_id: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        *self == SearchFilters::default()
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available metadata backends.
#[derive(Debug, Clone)]
pub enum MetadataProvider {
    Tvdb(tvdb::TvdbClient),
    Fixture(fixture::FixtureProvider),
}

type ListResult = Result<Vec<Value>, MetadataError>;

impl MetadataProvider {
    // ── entity (series) operations ────────────────────────────────────

    pub async fn search_entities(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> ListResult {
        match self {
            Self::Tvdb(c) => c.search_entities(query, limit, filters).await,
            Self::Fixture(f) => f.search_entities(query, limit, filters),
        }
    }

    pub async fn get_entity_details(&self, id: i64) -> Result<Value, MetadataError> {
        match self {
            Self::Tvdb(c) => c.get_entity_details(id).await,
            Self::Fixture(f) => f.get_entity_details(id),
        }
    }

    pub async fn get_entity_episodes(&self, id: i64, season: Option<i64>) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_entity_episodes(id, season).await,
            Self::Fixture(f) => f.get_entity_episodes(id, season),
        }
    }

    pub async fn get_entity_awards(&self, id: i64) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_entity_awards(id).await,
            Self::Fixture(f) => f.get_entity_awards(id),
        }
    }

    /// The global awards catalog: every category with its records. Scanned
    /// as the last tier of the awards lookup strategy.
    pub async fn get_awards_catalog(&self) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_awards_catalog().await,
            Self::Fixture(f) => f.get_awards_catalog(),
        }
    }

    pub async fn get_similar_entities(&self, id: i64) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_similar_entities(id).await,
            Self::Fixture(f) => f.get_similar_entities(id),
        }
    }

    pub async fn get_entities_by_source(&self, name: &str, limit: usize) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_entities_by_source(name, limit).await,
            Self::Fixture(f) => f.get_entities_by_source(name, limit),
        }
    }

    pub async fn advanced_search(&self, filters: &SearchFilters, limit: usize) -> ListResult {
        match self {
            Self::Tvdb(c) => c.advanced_search(filters, limit).await,
            Self::Fixture(f) => f.advanced_search(filters, limit),
        }
    }

    pub async fn get_upcoming_entities(&self, genre: Option<&str>) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_upcoming_entities(genre).await,
            Self::Fixture(f) => f.get_upcoming_entities(genre),
        }
    }

    pub async fn get_next_release(&self, id: i64) -> Result<Value, MetadataError> {
        match self {
            Self::Tvdb(c) => c.get_next_release(id).await,
            Self::Fixture(f) => f.get_next_release(id),
        }
    }

    pub async fn get_entity_artwork(&self, id: i64) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_entity_artwork(id).await,
            Self::Fixture(f) => f.get_entity_artwork(id),
        }
    }

    pub async fn get_person_credits(&self, name: &str) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_person_credits(name).await,
            Self::Fixture(f) => f.get_person_credits(name),
        }
    }

    // ── media (movie) operations ──────────────────────────────────────

    pub async fn search_media(&self, query: &str, limit: usize) -> ListResult {
        match self {
            Self::Tvdb(c) => c.search_media(query, limit).await,
            Self::Fixture(f) => f.search_media(query, limit),
        }
    }

    pub async fn get_media_details(&self, id: i64) -> Result<Value, MetadataError> {
        match self {
            Self::Tvdb(c) => c.get_media_details(id).await,
            Self::Fixture(f) => f.get_media_details(id),
        }
    }

    pub async fn get_similar_media(&self, id: i64) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_similar_media(id).await,
            Self::Fixture(f) => f.get_similar_media(id),
        }
    }

    pub async fn get_media_by_person(&self, name: &str) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_media_by_person(name).await,
            Self::Fixture(f) => f.get_media_by_person(name),
        }
    }

    pub async fn get_media_awards(&self, id: i64) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_media_awards(id).await,
            Self::Fixture(f) => f.get_media_awards(id),
        }
    }

    pub async fn get_trending_media(&self, genre: Option<&str>) -> ListResult {
        match self {
            Self::Tvdb(c) => c.get_trending_media(genre).await,
            Self::Fixture(f) => f.get_trending_media(genre),
        }
    }

    pub async fn recommend_media(&self, filters: &SearchFilters) -> ListResult {
        match self {
            Self::Tvdb(c) => c.recommend_media(filters).await,
            Self::Fixture(f) => f.recommend_media(filters),
        }
    }
}
