//! Conversation orchestrator — one entry point, [`Bot::handle_turn`], that
//! never fails.
//!
//! A turn runs: resolve session → snapshot context → classify → dispatch →
//! record the turn → refresh last-entity-context → standard-limit → narrate.
//! A typed narration overflow triggers exactly one retry with the
//! extreme-limited payload; any residual narration failure yields a fixed
//! apology. Whatever happens upstream, the caller gets a reply string and a
//! session key.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::degrade;
use crate::dispatch::{self, Dispatcher};
use crate::intent::Turn;
use crate::llm::{LanguageModel, ProviderError};
use crate::memory::SessionStore;
use crate::metadata::MetadataProvider;

/// Apology for a payload the narrator could not fit even after extreme
/// limiting.
const OVERFLOW_APOLOGY: &str = "I found information about this movie but couldn't process all \
the details due to the large amount of data. Please try asking about specific aspects like the \
plot, director, or main cast.";

/// Apology for any other narration failure.
const GENERIC_APOLOGY: &str =
    "I'm having trouble generating a response right now. Please try again later.";

pub struct Bot {
    store: SessionStore,
    llm: LanguageModel,
    dispatcher: Dispatcher,
}

impl Bot {
    pub fn new(store: SessionStore, llm: LanguageModel, provider: MetadataProvider) -> Self {
        Self { store, llm, dispatcher: Dispatcher::new(provider) }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Process one user message. Returns the reply and the session key the
    /// caller should hand back on the next turn.
    pub async fn handle_turn(&self, session_key: Option<&str>, text: &str) -> (String, String) {
        let key = self.store.resolve_session(session_key);
        let session = self.store.get_context(&key);
        let context = session.context();

        let intent = self.llm.classify(text, &context).await;
        info!(session = %key, intent = intent.kind.as_str(), "turn classified");

        let results = self
            .dispatcher
            .dispatch(&intent, &context, &self.store, &key)
            .await;

        // The turn goes into history after dispatch, before narration: the
        // record survives even if narration fails, and passive preference
        // inference sees the parameters the handlers actually used.
        self.store.record_turn(
            &key,
            Turn {
                text: text.to_string(),
                intent: intent.kind,
                params: intent.params.clone(),
            },
        );

        let ids = dispatch::extract_entity_ids(&results);
        if !ids.is_empty() {
            self.store.set_last_entity_context(&key, ids);
        }

        // Narration sees the freshly updated context, including the turn
        // just recorded.
        let context = self.store.get_context(&key).context();
        let limited = degrade::limit_standard(degrade::prepare(results));
        let reply = self
            .narrate_with_retry(text, &intent, &context, limited)
            .await;
        (reply, key)
    }

    /// One narration attempt at standard limits; any failure — overflow or
    /// timeout alike — earns exactly one retry at extreme limits.
    async fn narrate_with_retry(
        &self,
        text: &str,
        intent: &crate::intent::Intent,
        context: &crate::intent::ConversationContext,
        limited: Value,
    ) -> String {
        let mut input = narration_input(text, intent, &limited);
        attach_context(&mut input, context);
        match self.llm.narrate(&input).await {
            Ok(reply) => return reply,
            Err(ProviderError::Overflow { actual, budget }) => {
                warn!(actual, budget, "narration input over budget; retrying with extreme limits");
            }
            Err(e) => {
                warn!(error = %e, "narration failed; retrying with extreme limits");
            }
        }

        // The retry drops conversation history and preferences along with
        // the deep payload cuts.
        let extreme = degrade::limit_extreme(limited);
        let input = narration_input(text, intent, &extreme);
        match self.llm.narrate(&input).await {
            Ok(reply) => reply,
            Err(ProviderError::Overflow { actual, budget }) => {
                warn!(actual, budget, "narration input over budget even after extreme limits");
                OVERFLOW_APOLOGY.to_string()
            }
            Err(e) => {
                warn!(error = %e, "narration retry failed");
                GENERIC_APOLOGY.to_string()
            }
        }
    }
}

fn narration_input(text: &str, intent: &crate::intent::Intent, results: &Value) -> Value {
    json!({
        "query": text,
        "intent": intent.kind.as_str(),
        "parameters": intent.params,
        "search_results": results,
    })
}

/// First-attempt extras: a few recent turns and the known preferences.
fn attach_context(input: &mut Value, context: &crate::intent::ConversationContext) {
    let recent: Vec<&str> = context
        .recent_turns
        .iter()
        .rev()
        .take(3)
        .rev()
        .map(|t| t.text.as_str())
        .collect();
    if !recent.is_empty() {
        input["conversation_history"] = json!(recent);
    }
    if !context.preferences.is_empty() {
        input["user_preferences"] = json!(context.preferences);
    }
}
