//! Top-level request flow: resolve credentials, interpret, route, execute.

use std::sync::Arc;

use tracing::{debug, warn};

use voxcrm_core::intent::Intent;
use voxcrm_crm::CredentialResolver;

use crate::interpreter::{ChatMessage, Interpreter};
use crate::router::{IntentRouter, SpokenReply};
use crate::schema::SchemaGuide;

pub struct AssistantRuntime {
    resolver: CredentialResolver,
    router: IntentRouter,
    interpreter: Arc<dyn Interpreter>,
    schema: SchemaGuide,
}

impl AssistantRuntime {
    pub fn new(
        resolver: CredentialResolver,
        router: IntentRouter,
        interpreter: Arc<dyn Interpreter>,
        schema: SchemaGuide,
    ) -> Self {
        Self { resolver, router, interpreter, schema }
    }

    /// Handle one caller message end to end. This always returns something
    /// speakable; no failure below here escapes as an error.
    pub async fn handle_message(
        &self,
        caller_id: &str,
        history: &[ChatMessage],
        text: &str,
    ) -> SpokenReply {
        let auth = match self.resolver.resolve(caller_id).await {
            Ok(auth) => auth,
            Err(error) => {
                warn!(caller_id, %error, "credential resolution failed");
                return SpokenReply { text: error.speakable(), payload: None };
            }
        };

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(text));

        // Interpreter failures of any kind degrade to a clarification
        // rather than surfacing as an error.
        let intent = match self.interpreter.interpret(&messages, self.schema.text()).await {
            Ok(raw) => Intent::from_interpreter_json(&raw),
            Err(error) => {
                warn!(caller_id, %error, "interpreter call failed");
                Intent::clarify("")
            }
        };

        let decision = IntentRouter::route(intent, text);
        debug!(caller_id, ?decision, "routed");
        self.router.execute(&auth, decision).await
    }
}
