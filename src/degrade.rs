//! Payload degradation — bounded shrinking of dispatch results before
//! narration.
//!
//! Three levels:
//! - level 0: the dispatch result, untouched;
//! - level 1 ([`limit_standard`]): applied unconditionally before the first
//!   narration attempt;
//! - level 2 ([`limit_extreme`]): applied only on the single retry after a
//!   typed narration overflow.
//!
//! Structured `{error: ...}` payloads pass through every level unmodified —
//! they are already minimal. [`prepare`] guarantees there is always *some*
//! narratable payload: anything that is neither an object nor a list
//! becomes `{"data": []}`.
//!
//! All transformations are pure and deterministic.

use serde_json::{json, Map, Value};

/// Cap for person/cast lists at standard limiting.
const CAST_CAP_STANDARD: usize = 10;
/// Cap for person entries at extreme limiting.
const CAST_CAP_EXTREME: usize = 5;
/// Cap for lists of result objects at standard limiting.
const RESULTS_CAP_STANDARD: usize = 5;
/// Cap for lists of result objects at extreme limiting.
const RESULTS_CAP_EXTREME: usize = 3;
/// Long free-text fields are cut here at standard limiting.
const TEXT_CAP_STANDARD: usize = 500;
/// Short-overview cut for extreme limiting.
const TEXT_CAP_EXTREME: usize = 150;
/// Nested list fields inside result objects are cut here.
const NESTED_LIST_CAP: usize = 5;

/// Keys holding person/cast lists.
const PERSON_KEYS: &[&str] = &["cast", "characters"];
/// Keys holding long free text.
const TEXT_KEYS: &[&str] = &["overview", "summary"];
/// Keys holding lists of result objects.
const RESULT_LIST_KEYS: &[&str] = &[
    "results",
    "entities",
    "media",
    "similar_entities",
    "similar_media",
    "recommended_media",
    "trending_media",
    "credits",
    "artwork",
];
/// Nested list fields inside individual result objects.
const NESTED_LIST_KEYS: &[&str] = &["characters", "episodes", "seasons", "translations"];

/// Shape guarantee: always return something narratable.
pub fn prepare(results: Value) -> Value {
    match results {
        Value::Object(_) | Value::Array(_) => results,
        Value::Null => json!({"data": []}),
        other => json!({"data": other}),
    }
}

fn is_error_payload(v: &Value) -> bool {
    v.as_object().is_some_and(|o| o.contains_key("error"))
}

// ── Level 1: standard limiting ────────────────────────────────────────────────

pub fn limit_standard(payload: Value) -> Value {
    if is_error_payload(&payload) {
        return payload;
    }
    match payload {
        Value::Array(items) => Value::Array(truncate_result_list(items, RESULTS_CAP_STANDARD)),
        Value::Object(map) => Value::Object(limit_object_standard(map)),
        other => prepare(other),
    }
}

fn limit_object_standard(mut map: Map<String, Value>) -> Map<String, Value> {
    // Person/cast lists: cap at 10 with a count note.
    for &key in PERSON_KEYS {
        if let Some(Value::Array(people)) = map.get(key) {
            let total = people.len();
            if total > CAST_CAP_STANDARD {
                let capped: Vec<Value> = people.iter().take(CAST_CAP_STANDARD).cloned().collect();
                map.insert(key.to_string(), Value::Array(capped));
                map.insert(
                    format!("{key}_note"),
                    json!(format!("Showing top {CAST_CAP_STANDARD} of {total} entries")),
                );
            }
        }
    }

    // Long free text on the object itself.
    for &key in TEXT_KEYS {
        if let Some(Value::String(text)) = map.get(key) {
            if text.chars().count() > TEXT_CAP_STANDARD {
                let cut: String = text.chars().take(TEXT_CAP_STANDARD).collect();
                map.insert(key.to_string(), json!(format!("{cut}...")));
            }
        }
    }

    // Nested list fields: cap at 5 with a sibling count annotation.
    let mut annotations: Vec<(String, usize)> = Vec::new();
    for &key in NESTED_LIST_KEYS {
        if PERSON_KEYS.contains(&key) {
            continue; // already capped above with its own note
        }
        if let Some(Value::Array(items)) = map.get(key) {
            let total = items.len();
            if total > NESTED_LIST_CAP {
                let capped: Vec<Value> = items.iter().take(NESTED_LIST_CAP).cloned().collect();
                map.insert(key.to_string(), Value::Array(capped));
                annotations.push((format!("{key}_count"), total));
            }
        }
    }
    for (key, total) in annotations {
        map.insert(key, json!(total));
    }

    // Lists of result objects: cap at 5, trimming each item.
    for &key in RESULT_LIST_KEYS {
        if let Some(Value::Array(items)) = map.remove(key) {
            map.insert(
                key.to_string(),
                Value::Array(truncate_result_list(items, RESULTS_CAP_STANDARD)),
            );
        }
    }

    map
}

fn truncate_result_list(items: Vec<Value>, cap: usize) -> Vec<Value> {
    items
        .into_iter()
        .take(cap)
        .map(|item| match item {
            Value::Object(map) => Value::Object(trim_result_item(map)),
            other => other,
        })
        .collect()
}

fn trim_result_item(mut map: Map<String, Value>) -> Map<String, Value> {
    for &key in TEXT_KEYS {
        if let Some(Value::String(text)) = map.get(key) {
            if text.chars().count() > TEXT_CAP_STANDARD {
                let cut: String = text.chars().take(TEXT_CAP_STANDARD).collect();
                map.insert(key.to_string(), json!(format!("{cut}...")));
            }
        }
    }
    let mut annotations: Vec<(String, usize)> = Vec::new();
    for &key in NESTED_LIST_KEYS {
        if let Some(Value::Array(items)) = map.get(key) {
            let total = items.len();
            if total > NESTED_LIST_CAP {
                let capped: Vec<Value> = items.iter().take(NESTED_LIST_CAP).cloned().collect();
                map.insert(key.to_string(), Value::Array(capped));
                annotations.push((format!("{key}_count"), total));
            }
        }
    }
    for (key, total) in annotations {
        map.insert(key, json!(total));
    }
    map
}

// ── Level 2: extreme limiting ─────────────────────────────────────────────────

/// Applied only as the single retry after a narration overflow. Starts from
/// the standard-limited shape and cuts much deeper.
pub fn limit_extreme(payload: Value) -> Value {
    if is_error_payload(&payload) {
        return payload;
    }
    let payload = limit_standard(payload);
    match payload {
        Value::Array(items) => Value::Array(essentials_list(items)),
        Value::Object(mut map) => {
            // Person entries: name + role only, cap 5.
            for &key in PERSON_KEYS {
                if let Some(Value::Array(people)) = map.remove(key) {
                    let simplified: Vec<Value> =
                        people.iter().take(CAST_CAP_EXTREME).map(simplify_person).collect();
                    map.insert(key.to_string(), Value::Array(simplified));
                    map.insert(
                        format!("{key}_note"),
                        json!(format!("Showing only top {CAST_CAP_EXTREME} entries with limited details")),
                    );
                }
            }
            // Result lists: essential-fields subset, cap 3.
            for &key in RESULT_LIST_KEYS {
                if let Some(Value::Array(items)) = map.remove(key) {
                    map.insert(key.to_string(), Value::Array(essentials_list(items)));
                }
            }
            // A detail object carrying its own identity is reduced in place.
            if map.contains_key("id") && map.contains_key("name") {
                return Value::Object(essential_fields(&map));
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn essentials_list(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .take(RESULTS_CAP_EXTREME)
        .map(|item| match item {
            Value::Object(map) => Value::Object(essential_fields(&map)),
            other => other,
        })
        .collect()
}

/// id, name, year, short overview, up to two genre names.
fn essential_fields(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(id) = map.get("id") {
        out.insert("id".into(), id.clone());
    }
    let name = map.get("name").or_else(|| map.get("title"));
    if let Some(name) = name {
        out.insert("name".into(), name.clone());
    }
    if let Some(year) = map.get("year") {
        out.insert("year".into(), year.clone());
    }
    if let Some(Value::String(overview)) = map.get("overview") {
        let short: String = overview.chars().take(TEXT_CAP_EXTREME).collect();
        let short = if overview.chars().count() > TEXT_CAP_EXTREME {
            format!("{short}...")
        } else {
            short
        };
        out.insert("overview".into(), json!(short));
    }
    if let Some(Value::Array(genres)) = map.get("genres") {
        let names: Vec<Value> = genres
            .iter()
            .take(2)
            .map(|g| match g {
                Value::Object(o) => o.get("name").cloned().unwrap_or(Value::Null),
                other => other.clone(),
            })
            .collect();
        out.insert("genres".into(), Value::Array(names));
    }
    out
}

fn simplify_person(person: &Value) -> Value {
    let name = person["name"]
        .as_str()
        .or_else(|| person["personName"].as_str())
        .unwrap_or("Unknown");
    let role = person["character"]
        .as_str()
        .or_else(|| person["characterName"].as_str())
        .or_else(|| person["role"].as_str())
        .unwrap_or("");
    json!({"name": name, "role": role})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast_of(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"name": format!("Actor {i}"), "character": format!("Role {i}")}))
            .collect()
    }

    #[test]
    fn prepare_guarantees_shape() {
        assert_eq!(prepare(Value::Null), json!({"data": []}));
        assert_eq!(prepare(json!("oops")), json!({"data": "oops"}));
        assert_eq!(prepare(json!([1])), json!([1]));
        assert_eq!(prepare(json!({"k": 1})), json!({"k": 1}));
    }

    #[test]
    fn error_payload_passes_through_both_levels() {
        let err = json!({"error": "Could not find series 'X'", "suggestions": ["try again"]});
        assert_eq!(limit_standard(err.clone()), err);
        assert_eq!(limit_extreme(err.clone()), err);
    }

    #[test]
    fn cast_of_15_becomes_10_with_note() {
        let out = limit_standard(json!({"cast": cast_of(15)}));
        assert_eq!(out["cast"].as_array().unwrap().len(), 10);
        assert!(out["cast_note"].as_str().unwrap().contains("15"));
    }

    #[test]
    fn cast_of_3_is_untouched_without_note() {
        let out = limit_standard(json!({"cast": cast_of(3)}));
        assert_eq!(out["cast"].as_array().unwrap().len(), 3);
        assert!(out.get("cast_note").is_none());
    }

    #[test]
    fn long_overview_is_cut_at_500() {
        let long = "x".repeat(900);
        let out = limit_standard(json!({"overview": long}));
        let cut = out["overview"].as_str().unwrap();
        assert_eq!(cut.chars().count(), 503); // 500 + "..."
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn nested_lists_capped_with_count_annotation() {
        let episodes: Vec<Value> = (0..8).map(|i| json!({"number": i})).collect();
        let out = limit_standard(json!({"series_name": "BB", "episodes": episodes}));
        assert_eq!(out["episodes"].as_array().unwrap().len(), 5);
        assert_eq!(out["episodes_count"], 8);
    }

    #[test]
    fn result_lists_capped_at_5() {
        let results: Vec<Value> = (0..9).map(|i| json!({"id": i, "name": format!("S{i}")})).collect();
        let out = limit_standard(json!({"results": results}));
        assert_eq!(out["results"].as_array().unwrap().len(), 5);

        let bare = limit_standard(json!((0..9).map(|i| json!({"id": i})).collect::<Vec<_>>()));
        assert_eq!(bare.as_array().unwrap().len(), 5);
    }

    #[test]
    fn extreme_reduces_people_to_name_and_role() {
        let out = limit_extreme(json!({"cast": cast_of(8)}));
        let cast = out["cast"].as_array().unwrap();
        assert_eq!(cast.len(), 5);
        assert_eq!(cast[0], json!({"name": "Actor 0", "role": "Role 0"}));
    }

    #[test]
    fn extreme_reduces_results_to_essentials() {
        let results: Vec<Value> = (0..6)
            .map(|i| {
                json!({
                    "id": i,
                    "name": format!("S{i}"),
                    "year": 2000 + i,
                    "overview": "o".repeat(400),
                    "genres": [{"name": "Drama"}, {"name": "Crime"}, {"name": "Noir"}],
                    "network": "AMC",
                })
            })
            .collect();
        let out = limit_extreme(json!({"results": results}));
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        let first = results[0].as_object().unwrap();
        assert!(first.contains_key("id"));
        assert!(first.contains_key("name"));
        assert_eq!(first["genres"].as_array().unwrap().len(), 2);
        assert!(first["overview"].as_str().unwrap().len() <= 153);
        assert!(!first.contains_key("network"));
    }

    #[test]
    fn extreme_reduces_detail_object_in_place() {
        let detail = json!({
            "id": 81189,
            "name": "Breaking Bad",
            "year": 2008,
            "overview": "o".repeat(600),
            "genres": [{"name": "Drama"}, {"name": "Crime"}],
            "seasons": [],
            "slug": "breaking-bad",
        });
        let out = limit_extreme(detail);
        let obj = out.as_object().unwrap();
        assert_eq!(obj["id"], 81189);
        assert!(!obj.contains_key("slug"));
        assert_eq!(obj["genres"], json!(["Drama", "Crime"]));
    }

    #[test]
    fn title_stands_in_for_name() {
        let out = limit_extreme(json!({"results": [{"id": 1, "title": "Heat"}]}));
        assert_eq!(out["results"][0]["name"], "Heat");
    }
}
