//! Uniform JSON response envelope.
//!
//! ```text
//! {"status":"success"[,"data":...]}
//! {"status":"failure"[,"data":...]}
//! {"status":"error","message":"..."}
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use rampart_keystore::StoreError;

/// Outcome of a handled request.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// The request did what was asked, optionally returning data.
    Success(Option<Value>),
    /// The request was understood but refused; carries the reason.
    Failure(Value),
    /// Something went wrong while handling the request.
    Error(String),
}

impl Envelope {
    /// Success without a payload.
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success carrying `data`.
    pub fn success_with(data: Value) -> Self {
        Self::Success(Some(data))
    }

    /// Failure carrying `detail`.
    pub fn failure(detail: Value) -> Self {
        Self::Failure(detail)
    }

    /// Error with a message. An empty message is replaced so clients always get text.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            Self::Error("internal error".to_string())
        } else {
            Self::Error(message)
        }
    }

    /// Maps a store result: `Ok` through `f` into success, rejections into
    /// failure and faults into error.
    pub fn from_store<T>(result: Result<T, StoreError>, f: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => f(value),
            Err(e) => e.into(),
        }
    }

    /// Whether this is the success variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Encodes the envelope as a JSON value.
    pub fn to_json(&self) -> Value {
        // Serializing a map of strings and values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<StoreError> for Envelope {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(detail) => Self::failure(detail),
            StoreError::Fault(message) => Self::error(message),
        }
    }
}

fn payload(data: &Option<Value>) -> Option<&Value> {
    data.as_ref().filter(|value| !value.is_null())
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Self::Success(data) => {
                map.serialize_entry("status", "success")?;
                if let Some(data) = payload(data) {
                    map.serialize_entry("data", data)?;
                }
            },
            Self::Failure(detail) => {
                map.serialize_entry("status", "failure")?;
                if !detail.is_null() {
                    map.serialize_entry("data", detail)?;
                }
            },
            Self::Error(message) => {
                map.serialize_entry("status", "error")?;
                map.serialize_entry("message", message)?;
            },
        }
        map.end()
    }
}
