//! End-to-end pipeline tests: session memory, classification fallback,
//! dispatch strategies, and degradation, driven through `Bot::handle_turn`
//! with the offline fixture catalog and the dummy LLM.

use serde_json::json;

use tellybot::bot::Bot;
use tellybot::intent::{ConversationContext, Intent, IntentKind, ParamValue, Params};
use tellybot::llm::providers::dummy::DummyProvider;
use tellybot::llm::{LanguageModel, LlmBackend};
use tellybot::memory::SessionStore;
use tellybot::metadata::fixture::FixtureProvider;
use tellybot::metadata::MetadataProvider;

fn bot_with(fixture: FixtureProvider) -> Bot {
    Bot::new(
        SessionStore::new(None, None),
        LanguageModel::new(LlmBackend::Dummy(DummyProvider::new()), 12_000),
        MetadataProvider::Fixture(fixture),
    )
}

fn sample_bot() -> Bot {
    bot_with(FixtureProvider::sample())
}

#[tokio::test]
async fn anaphoric_followup_rides_on_last_entity_context() {
    let bot = sample_bot();

    let (_, key) = bot.handle_turn(None, "tell me about Breaking Bad").await;
    let session = bot.store().get_context(&key);
    assert_eq!(session.last_entities, vec![81189]);

    // "more like that" carries no name; the dispatcher must pick up 81189
    // from the context and find series sharing its genres.
    let (reply, key2) = bot.handle_turn(Some(&key), "more like that").await;
    assert_eq!(key, key2);
    assert!(!reply.is_empty());

    let session = bot.store().get_context(&key);
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[1].intent, IntentKind::GetSimilarEntities);
    // Similar-series hits replaced the context; Breaking Bad itself is gone.
    assert!(!session.last_entities.is_empty());
    assert!(!session.last_entities.contains(&81189));
}

#[tokio::test]
async fn named_similar_then_anaphoric_followup() {
    let bot = sample_bot();

    // Turn 1 names the series; context becomes the similar hits' IDs.
    let (reply, key) = bot.handle_turn(None, "shows like Breaking Bad").await;
    assert!(!reply.is_empty());
    let session = bot.store().get_context(&key);
    assert_eq!(session.history[0].intent, IntentKind::GetSimilarEntities);
    assert!(!session.last_entities.is_empty());

    // Turn 2 names nothing; resolution must ride the stored context.
    let (reply2, _) = bot.handle_turn(Some(&key), "more like that").await;
    assert!(!reply2.is_empty());
    let session = bot.store().get_context(&key);
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[1].intent, IntentKind::GetSimilarEntities);
    assert!(!session.last_entities.is_empty());
}

#[tokio::test]
async fn episode_listing_leaves_series_context_intact() {
    // Episode records carry their own id fields. Listing them must not
    // overwrite the series context, or the next "more like that" would
    // resolve against an episode ID.
    let fixture = FixtureProvider::sample().with_episodes(
        81189,
        vec![
            json!({"id": 7000001, "seasonNumber": 1, "number": 1, "name": "Pilot"}),
            json!({"id": 7000002, "seasonNumber": 1, "number": 2, "name": "Cat's in the Bag..."}),
        ],
    );
    let bot = bot_with(fixture);

    let (_, key) = bot.handle_turn(None, "tell me about Breaking Bad").await;
    assert_eq!(bot.store().get_context(&key).last_entities, vec![81189]);

    let (reply, _) = bot.handle_turn(Some(&key), "list the episodes").await;
    assert!(!reply.is_empty());
    assert_eq!(bot.store().get_context(&key).last_entities, vec![81189]);
}

#[tokio::test]
async fn classification_failure_records_help_turn_and_still_replies() {
    let bot = Bot::new(
        SessionStore::new(None, None),
        LanguageModel::new(LlmBackend::Dummy(DummyProvider::failing()), 12_000),
        MetadataProvider::Fixture(FixtureProvider::sample()),
    );
    let (reply, key) = bot.handle_turn(None, "complete gibberish ~~~").await;
    assert!(!reply.is_empty());

    let session = bot.store().get_context(&key);
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.history[0].intent, IntentKind::Help);
    assert!(session.history[0].params.is_empty());
}

#[tokio::test]
async fn every_intent_survives_an_empty_catalog() {
    // The hard guarantee: no intent, however the lookup goes, escapes as an
    // error. An empty fixture forces every handler down its failure path.
    let store = SessionStore::new(None, None);
    let dispatcher =
        tellybot::dispatch::Dispatcher::new(MetadataProvider::Fixture(FixtureProvider::new()));
    for kind in IntentKind::all() {
        let mut params = Params::new();
        params.insert("entity_name", ParamValue::Str("Anything".into()));
        params.insert("media_name", ParamValue::Str("Anything".into()));
        params.insert("actor_name", ParamValue::Str("Anyone".into()));
        params.insert("character_name", ParamValue::Str("Someone".into()));
        params.insert("network", ParamValue::Str("Nowhere".into()));
        let intent = Intent::new(*kind, params);
        let payload = dispatcher
            .dispatch(&intent, &ConversationContext::default(), &store, "k")
            .await;
        assert!(
            payload.is_object(),
            "{} returned a non-object payload: {payload}",
            kind.as_str()
        );
    }
}

#[tokio::test]
async fn recommendation_ladder_lands_on_trending_with_marker() {
    // Recommendations and per-genre retries are forced empty; trending is
    // the first rung that answers, and the payload says so.
    let fixture = FixtureProvider::sample().force_empty("recommend_media");
    let bot = bot_with(fixture);

    let (reply, key) = bot.handle_turn(None, "recommend me something good").await;
    assert!(!reply.is_empty());

    // The narration consumed the payload; verify the strategy through a
    // direct dispatch with the same conditions.
    let dispatcher = tellybot::dispatch::Dispatcher::new(MetadataProvider::Fixture(
        FixtureProvider::sample().force_empty("recommend_media"),
    ));
    let intent = Intent::new(IntentKind::RecommendMedia, Params::new());
    let payload = dispatcher
        .dispatch(
            &intent,
            &ConversationContext::default(),
            bot.store(),
            &key,
        )
        .await;
    assert_eq!(payload["strategy"], "trending");
    assert!(!payload["recommended_media"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn passive_preferences_accumulate_across_turns() {
    let bot = sample_bot();
    // The dummy classifier maps "tell me about X" to details with
    // entity_name only, so drive preference-bearing turns directly.
    let (_, key) = bot.handle_turn(None, "tell me about Breaking Bad").await;

    bot.store().update_preferences(
        &key,
        &["Crime".to_string()],
        &[81189],
        &["Bryan Cranston".to_string()],
        &["AMC".to_string()],
    );
    bot.store()
        .update_preferences(&key, &["Crime".to_string()], &[], &[], &[]);

    let prefs = bot.store().get_context(&key).preferences;
    assert_eq!(prefs.favorite_genres, vec!["Crime"]);
    assert_eq!(prefs.favorite_entities, vec![81189]);
    assert_eq!(prefs.preferred_sources, vec!["AMC"]);
}

#[tokio::test]
async fn oversized_detail_payload_degrades_instead_of_failing() {
    // A detail record with a 15-person cast and a long overview goes through
    // standard limiting before narration; the turn succeeds.
    let mut series = tellybot::metadata::fixture::series_record(
        500,
        "Sprawling Epic",
        &["Drama"],
        "HBO",
        2020,
    );
    series["overview"] = json!("w".repeat(2000));
    series["characters"] = json!((0..15)
        .map(|i| json!({"name": format!("Char {i}"), "personName": format!("Actor {i}")}))
        .collect::<Vec<_>>());
    let fixture = FixtureProvider::new().with_series(vec![series]);
    let bot = bot_with(fixture);

    let (reply, key) = bot.handle_turn(None, "tell me about Sprawling Epic").await;
    assert!(!reply.is_empty());
    assert!(!reply.contains("trouble generating"));
    assert_eq!(bot.store().get_context(&key).last_entities, vec![500]);
}

#[tokio::test]
async fn fresh_session_key_is_minted_for_unknown_keys() {
    let bot = sample_bot();
    let (_, key) = bot.handle_turn(Some("long-gone-session"), "help").await;
    assert_ne!(key, "long-gone-session");
    assert_eq!(bot.store().session_count(), 1);
}
