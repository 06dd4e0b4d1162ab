//! Resource policies.
//!
//! Each resource declares its allowed methods, the media types it produces and
//! consumes, an existence check and one handler per method. The engine runs
//! them in that order. The value produced by a successful existence check is
//! moved into the handler, so handlers never look a key up a second time.

mod actions;
mod keys;
mod system;

pub use actions::{ActionHandler, ActionTarget, KeyActions};
pub use keys::{CollectionHandler, ItemHandler, KeyCollection, KeyItem, KeyItemPem, PemHandler};
pub use system::{StatusHandler, SystemStatus};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Method;
use serde_json::Value;

use rampart_keystore::KeyStore;

use crate::envelope::Envelope;
use crate::media::MediaType;
use crate::routes::{RouteBinding, RouteTable};

/// Request data visible to handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request method.
    pub method: Method,
    /// Values bound from the path.
    pub bindings: RouteBinding,
    /// Raw request body.
    pub body: Bytes,
    /// Negotiated response type.
    pub content_type: MediaType,
}

impl RequestContext {
    /// Parses the body as JSON, describing the problem on failure.
    pub fn json_body(&self) -> Result<Value, String> {
        serde_json::from_slice(&self.body).map_err(|e| format!("invalid JSON body: {}", e))
    }
}

/// Body produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Enveloped JSON.
    Envelope(Envelope),
    /// Raw JSON, not enveloped.
    Json(Value),
    /// Raw text in the negotiated media type.
    Text(String),
}

/// Result of running a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Whether the request was carried out. The body is sent either way.
    pub accepted: bool,
    /// Response body.
    pub body: ResponseBody,
    /// Where the client should look next (API-relative path).
    pub location: Option<String>,
}

impl Outcome {
    /// Accepted, with the given body.
    pub fn handled(body: ResponseBody) -> Self {
        Self {
            accepted: true,
            body,
            location: None,
        }
    }

    /// Accepted envelope.
    pub fn envelope(envelope: Envelope) -> Self {
        Self::handled(ResponseBody::Envelope(envelope))
    }

    /// Accepted envelope that points at a new resource.
    pub fn redirect(envelope: Envelope, location: String) -> Self {
        Self {
            accepted: true,
            body: ResponseBody::Envelope(envelope),
            location: Some(location),
        }
    }

    /// Not accepted; the envelope explains why.
    pub fn refused(envelope: Envelope) -> Self {
        Self {
            accepted: false,
            body: ResponseBody::Envelope(envelope),
            location: None,
        }
    }

    /// Accepted only if the envelope is a success.
    pub fn from_envelope(envelope: Envelope) -> Self {
        if envelope.is_success() {
            Self::envelope(envelope)
        } else {
            Self::refused(envelope)
        }
    }
}

/// Declarative description of one resource.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Proof of existence handed from the existence check to the handler.
    type Found: Send;
    /// The resource's handlers, one per method.
    type Handler: Copy + Send;

    /// Methods the resource answers.
    fn allowed_methods(&self) -> &'static [Method];

    /// Response media types, in order of preference.
    fn content_types_provided(&self) -> &'static [MediaType];

    /// Request body media types.
    fn content_types_accepted(&self) -> &'static [MediaType] {
        &[]
    }

    /// Handler for `method`, if the resource has one.
    fn handler(&self, method: &Method) -> Option<Self::Handler>;

    /// Checks that the resource exists, yielding what the handler needs.
    async fn resource_exists(
        &self,
        store: &dyn KeyStore,
        bindings: &RouteBinding,
    ) -> Option<Self::Found>;

    /// Runs `handler`. Every failure is reported through the outcome.
    async fn handle(
        &self,
        handler: Self::Handler,
        found: Self::Found,
        ctx: RequestContext,
        store: &dyn KeyStore,
    ) -> Outcome;
}

/// The API's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// `/keys`
    KeyCollection(KeyCollection),
    /// `/keys/:id` and `/keys/:id/public`
    KeyItem(KeyItem),
    /// `/keys/:id/public.pem`
    KeyItemPem(KeyItemPem),
    /// `/keys/:id/actions/...`
    KeyActions(KeyActions),
    /// `/system/status`
    SystemStatus(SystemStatus),
}

/// Route table for the API, relative to the version prefix.
pub fn route_table() -> RouteTable<Resource> {
    let mut table = RouteTable::new();
    table
        .register("/keys", Resource::KeyCollection(KeyCollection))
        .register("/keys/:id", Resource::KeyItem(KeyItem))
        .register("/keys/:id/public.pem", Resource::KeyItemPem(KeyItemPem))
        .register("/keys/:id/public", Resource::KeyItem(KeyItem))
        .register("/keys/:id/actions/:action", Resource::KeyActions(KeyActions))
        .register(
            "/keys/:id/actions/:padding/:action",
            Resource::KeyActions(KeyActions),
        )
        .register(
            "/keys/:id/actions/:padding/:hash_type/:action",
            Resource::KeyActions(KeyActions),
        )
        .register("/system/status", Resource::SystemStatus(SystemStatus));
    table
}
