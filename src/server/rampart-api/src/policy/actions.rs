//! Sign and decrypt actions on a key.

use async_trait::async_trait;
use axum::http::Method;
use tracing::debug;

use rampart_keystore::{KeyStore, StoredKey};

use super::{Outcome, Policy, RequestContext};
use crate::action::{self, Operation};
use crate::envelope::Envelope;
use crate::media::MediaType;
use crate::routes::RouteBinding;

/// `/keys/:id/actions/[:padding/[:hash_type/]]:action`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyActions;

/// Handlers of [`KeyActions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionHandler {
    /// POST
    Run,
}

/// An existing key together with the operation the path resolved to.
#[derive(Debug, Clone)]
pub struct ActionTarget {
    /// The key to operate with.
    pub key: StoredKey,
    /// The validated operation.
    pub operation: Operation,
}

#[async_trait]
impl Policy for KeyActions {
    type Found = ActionTarget;
    type Handler = ActionHandler;

    fn allowed_methods(&self) -> &'static [Method] {
        const METHODS: &[Method] = &[Method::POST];
        METHODS
    }

    fn content_types_provided(&self) -> &'static [MediaType] {
        &[MediaType::Json]
    }

    fn content_types_accepted(&self) -> &'static [MediaType] {
        &[MediaType::Json]
    }

    fn handler(&self, method: &Method) -> Option<ActionHandler> {
        (*method == Method::POST).then_some(ActionHandler::Run)
    }

    /// An unsupported action path is reported as a missing resource.
    async fn resource_exists(
        &self,
        store: &dyn KeyStore,
        bindings: &RouteBinding,
    ) -> Option<ActionTarget> {
        let operation = match action::resolve(bindings) {
            Ok(operation) => operation,
            Err(e) => {
                debug!(error = %e, "action path did not resolve");
                return None;
            },
        };
        let key = store.get(bindings.get("id")?).await?;
        Some(ActionTarget { key, operation })
    }

    async fn handle(
        &self,
        _: ActionHandler,
        target: ActionTarget,
        ctx: RequestContext,
        store: &dyn KeyStore,
    ) -> Outcome {
        let params = match ctx.json_body() {
            Ok(params) => params,
            Err(message) => return Outcome::envelope(Envelope::error(message)),
        };

        let result = match target.operation {
            Operation::Sign(padding) => store.sign(&target.key, padding, params).await,
            Operation::Decrypt(padding) => store.decrypt(&target.key, padding, params).await,
        };
        Outcome::envelope(Envelope::from_store(result, Envelope::success_with))
    }
}
