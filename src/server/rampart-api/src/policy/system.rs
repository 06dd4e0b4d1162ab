//! Service status resource.

use async_trait::async_trait;
use axum::http::Method;
use serde_json::json;

use rampart_keystore::KeyStore;

use super::{Outcome, Policy, RequestContext, ResponseBody};
use crate::media::MediaType;
use crate::routes::RouteBinding;

/// `/system/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus;

/// Handlers of [`SystemStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHandler {
    /// GET
    Show,
}

#[async_trait]
impl Policy for SystemStatus {
    type Found = ();
    type Handler = StatusHandler;

    fn allowed_methods(&self) -> &'static [Method] {
        const METHODS: &[Method] = &[Method::GET];
        METHODS
    }

    fn content_types_provided(&self) -> &'static [MediaType] {
        &[MediaType::Json]
    }

    fn handler(&self, method: &Method) -> Option<StatusHandler> {
        (*method == Method::GET).then_some(StatusHandler::Show)
    }

    async fn resource_exists(&self, _: &dyn KeyStore, _: &RouteBinding) -> Option<()> {
        Some(())
    }

    async fn handle(
        &self,
        _: StatusHandler,
        _: (),
        _: RequestContext,
        _: &dyn KeyStore,
    ) -> Outcome {
        Outcome::handled(ResponseBody::Json(json!({ "status": "ok" })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::tests::context;
    use rampart_keystore::MemoryKeyStore;

    #[tokio::test]
    async fn test_status_is_plain_json() {
        let store = MemoryKeyStore::new();
        let outcome = SystemStatus
            .handle(
                StatusHandler::Show,
                (),
                context(Method::GET, RouteBinding::default(), ""),
                &store,
            )
            .await;

        assert!(outcome.accepted);
        assert_eq!(outcome.body, ResponseBody::Json(json!({"status": "ok"})));
    }
}
