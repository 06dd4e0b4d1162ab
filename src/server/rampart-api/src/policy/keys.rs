//! Key collection and key item resources.

use async_trait::async_trait;
use axum::http::Method;
use serde_json::{json, Value};
use tracing::debug;

use rampart_keystore::{KeyId, KeyStore, StoredKey};

use super::{Outcome, Policy, RequestContext, ResponseBody};
use crate::engine::API_PREFIX;
use crate::envelope::Envelope;
use crate::media::MediaType;
use crate::routes::RouteBinding;

/// API-relative location of a key.
pub(crate) fn key_location(id: &KeyId) -> String {
    format!("/keys/{}", id)
}

/// Location of a key including the version prefix, as clients request it.
fn public_location(id: &KeyId) -> String {
    format!("{}{}", API_PREFIX, key_location(id))
}

async fn lookup(store: &dyn KeyStore, bindings: &RouteBinding) -> Option<StoredKey> {
    store.get(bindings.get("id")?).await
}

fn show(store: &dyn KeyStore, key: &StoredKey, content_type: MediaType) -> Outcome {
    match content_type {
        MediaType::Json => Outcome::envelope(Envelope::success_with(store.public_key_json(key))),
        MediaType::Pem => match store.public_key_pem(key) {
            Ok(pem) => Outcome::handled(ResponseBody::Text(pem)),
            Err(e) => Outcome::refused(e.into()),
        },
    }
}

// ============================================================================
// /keys
// ============================================================================

/// The set of all keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCollection;

/// Handlers of [`KeyCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionHandler {
    /// GET, HEAD
    List,
    /// POST
    Create,
}

#[async_trait]
impl Policy for KeyCollection {
    type Found = ();
    type Handler = CollectionHandler;

    fn allowed_methods(&self) -> &'static [Method] {
        const METHODS: &[Method] = &[Method::GET, Method::HEAD, Method::POST];
        METHODS
    }

    fn content_types_provided(&self) -> &'static [MediaType] {
        &[MediaType::Json]
    }

    fn content_types_accepted(&self) -> &'static [MediaType] {
        &[MediaType::Json]
    }

    fn handler(&self, method: &Method) -> Option<CollectionHandler> {
        match *method {
            Method::GET | Method::HEAD => Some(CollectionHandler::List),
            Method::POST => Some(CollectionHandler::Create),
            _ => None,
        }
    }

    async fn resource_exists(&self, _: &dyn KeyStore, _: &RouteBinding) -> Option<()> {
        Some(())
    }

    async fn handle(
        &self,
        handler: CollectionHandler,
        _: (),
        ctx: RequestContext,
        store: &dyn KeyStore,
    ) -> Outcome {
        match handler {
            CollectionHandler::List => {
                let listed = store.list().await;
                Outcome::from_envelope(Envelope::from_store(listed, |keys| {
                    let items: Vec<Value> = keys
                        .into_iter()
                        .map(|(id, key)| json!({ "location": public_location(&id), "key": key }))
                        .collect();
                    Envelope::success_with(Value::Array(items))
                }))
            },
            CollectionHandler::Create => {
                let document = match ctx.json_body() {
                    Ok(document) => document,
                    Err(message) => return Outcome::refused(Envelope::error(message)),
                };
                match store.add(document).await {
                    Ok(id) => Outcome::redirect(Envelope::success(), key_location(&id)),
                    Err(e) => {
                        debug!(error = %e, "key import refused");
                        Outcome::refused(e.into())
                    },
                }
            },
        }
    }
}

// ============================================================================
// /keys/:id
// ============================================================================

/// A single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyItem;

/// Handlers of [`KeyItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemHandler {
    /// GET, HEAD
    Show,
    /// PUT
    Replace,
    /// DELETE
    Remove,
}

#[async_trait]
impl Policy for KeyItem {
    type Found = StoredKey;
    type Handler = ItemHandler;

    fn allowed_methods(&self) -> &'static [Method] {
        const METHODS: &[Method] = &[Method::GET, Method::HEAD, Method::PUT, Method::DELETE];
        METHODS
    }

    fn content_types_provided(&self) -> &'static [MediaType] {
        &[MediaType::Json, MediaType::Pem]
    }

    fn content_types_accepted(&self) -> &'static [MediaType] {
        &[MediaType::Json]
    }

    fn handler(&self, method: &Method) -> Option<ItemHandler> {
        match *method {
            Method::GET | Method::HEAD => Some(ItemHandler::Show),
            Method::PUT => Some(ItemHandler::Replace),
            Method::DELETE => Some(ItemHandler::Remove),
            _ => None,
        }
    }

    async fn resource_exists(
        &self,
        store: &dyn KeyStore,
        bindings: &RouteBinding,
    ) -> Option<StoredKey> {
        lookup(store, bindings).await
    }

    async fn handle(
        &self,
        handler: ItemHandler,
        key: StoredKey,
        ctx: RequestContext,
        store: &dyn KeyStore,
    ) -> Outcome {
        match handler {
            ItemHandler::Show => show(store, &key, ctx.content_type),
            ItemHandler::Replace => {
                let document = match ctx.json_body() {
                    Ok(document) => document,
                    Err(message) => return Outcome::refused(Envelope::error(message)),
                };
                let replaced = store.put(&key, document).await;
                Outcome::from_envelope(Envelope::from_store(replaced, |_| Envelope::success()))
            },
            ItemHandler::Remove => {
                if !store.del(key).await {
                    debug!("key was already removed by a concurrent request");
                }
                Outcome::envelope(Envelope::success())
            },
        }
    }
}

// ============================================================================
// /keys/:id/public.pem
// ============================================================================

/// PEM encoding of a key's public half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyItemPem;

/// Handlers of [`KeyItemPem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemHandler {
    /// GET
    Show,
}

#[async_trait]
impl Policy for KeyItemPem {
    type Found = StoredKey;
    type Handler = PemHandler;

    fn allowed_methods(&self) -> &'static [Method] {
        const METHODS: &[Method] = &[Method::GET];
        METHODS
    }

    fn content_types_provided(&self) -> &'static [MediaType] {
        &[MediaType::Pem]
    }

    fn handler(&self, method: &Method) -> Option<PemHandler> {
        (*method == Method::GET).then_some(PemHandler::Show)
    }

    async fn resource_exists(
        &self,
        store: &dyn KeyStore,
        bindings: &RouteBinding,
    ) -> Option<StoredKey> {
        lookup(store, bindings).await
    }

    async fn handle(
        &self,
        _: PemHandler,
        key: StoredKey,
        _: RequestContext,
        store: &dyn KeyStore,
    ) -> Outcome {
        show(store, &key, MediaType::Pem)
    }
}
