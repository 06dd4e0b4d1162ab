//! Decision engine.
//!
//! A single axum fallback handler matches the path against the route table and
//! runs the matched policy: method check, request media type, `Accept`
//! negotiation, existence check, then the handler. The handler's outcome is
//! turned into the status code and headers.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use rampart_keystore::KeyStore;

use crate::media::{self, MediaType};
use crate::policy::{self, Outcome, Policy, RequestContext, Resource, ResponseBody};
use crate::routes::{RouteBinding, RouteTable};

/// Path prefix under which every resource is served.
pub const API_PREFIX: &str = "/v1";

/// Engine settings.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Log every request and response at debug level.
    pub verbose: bool,
}

/// Router state shared by all requests.
#[derive(Clone)]
pub struct AppState {
    /// The key store.
    pub store: Arc<dyn KeyStore>,
    /// API routes, relative to [`API_PREFIX`].
    pub routes: Arc<RouteTable<Resource>>,
    /// Engine settings.
    pub config: EngineConfig,
}

impl AppState {
    /// Builds the state with the standard route table.
    pub fn new(store: Arc<dyn KeyStore>, config: EngineConfig) -> Self {
        Self {
            store,
            routes: Arc::new(policy::route_table()),
            config,
        }
    }
}

struct Incoming {
    method: Method,
    headers: HeaderMap,
    bindings: RouteBinding,
    body: Bytes,
}

/// Fallback handler serving every API request.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    if state.config.verbose {
        debug!(method = %method, path = %path, body_len = body.len(), "request");
    }

    let matched = path
        .strip_prefix(API_PREFIX)
        .and_then(|relative| state.routes.match_path(relative));

    let response = match matched {
        Some((resource, bindings)) => {
            let request = Incoming {
                method,
                headers,
                bindings,
                body,
            };
            resource.execute(state.store.as_ref(), request).await
        },
        None => StatusCode::NOT_FOUND.into_response(),
    };

    if state.config.verbose {
        debug!(path = %path, status = %response.status(), "response");
    }
    response
}

impl Resource {
    async fn execute(self, store: &dyn KeyStore, request: Incoming) -> Response {
        match self {
            Self::KeyCollection(policy) => run(&policy, store, request).await,
            Self::KeyItem(policy) => run(&policy, store, request).await,
            Self::KeyItemPem(policy) => run(&policy, store, request).await,
            Self::KeyActions(policy) => run(&policy, store, request).await,
            Self::SystemStatus(policy) => run(&policy, store, request).await,
        }
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn run<P: Policy>(policy: &P, store: &dyn KeyStore, request: Incoming) -> Response {
    let Incoming {
        method,
        headers,
        bindings,
        body,
    } = request;

    let allowed = policy.allowed_methods();
    let handler = match policy.handler(&method) {
        Some(handler) if allowed.contains(&method) => handler,
        _ => return method_not_allowed(allowed),
    };

    if method == Method::POST || method == Method::PUT {
        let content_type = header_str(&headers, header::CONTENT_TYPE);
        if !media::accepts(content_type, policy.content_types_accepted()) {
            debug!(content_type = ?content_type, "unsupported request media type");
            return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
        }
    }

    let accept = header_str(&headers, header::ACCEPT);
    let Some(content_type) = media::negotiate(accept, policy.content_types_provided()) else {
        debug!(accept = ?accept, "no acceptable response media type");
        return StatusCode::NOT_ACCEPTABLE.into_response();
    };

    let Some(found) = policy.resource_exists(store, &bindings).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let head = method == Method::HEAD;
    let ctx = RequestContext {
        method,
        bindings,
        body,
        content_type,
    };
    let outcome = policy.handle(handler, found, ctx, store).await;
    respond(outcome, content_type, head)
}

fn method_not_allowed(allowed: &[Method]) -> Response {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

fn respond(outcome: Outcome, negotiated: MediaType, head: bool) -> Response {
    let status = match (outcome.accepted, &outcome.location) {
        (true, Some(_)) => StatusCode::SEE_OTHER,
        (true, None) => StatusCode::OK,
        (false, _) => StatusCode::BAD_REQUEST,
    };

    let (media, payload) = match outcome.body {
        ResponseBody::Envelope(envelope) => (MediaType::Json, envelope.to_json().to_string()),
        ResponseBody::Json(value) => (MediaType::Json, value.to_string()),
        ResponseBody::Text(text) => (negotiated, text),
    };
    let body = if head {
        Body::empty()
    } else {
        Body::from(payload)
    };

    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(media.as_str()),
    );

    if let Some(location) = outcome.location {
        match HeaderValue::try_from(format!("{}{}", API_PREFIX, location)) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            },
            Err(e) => warn!(location = %location, error = %e, "unencodable location"),
        }
    }
    response
}
