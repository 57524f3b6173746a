//! Gateway event shapes.
//!
//! `InboundEvent` is the JSON record a gateway trigger delivers for one HTTP
//! request; `OutboundEvent` is the record handed back. Header and query
//! mappings are kept as ordered pairs because the adapter's tie-break rules
//! depend on delivery order.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GatewayError, GatewayResult};

/// An ordered string-to-string mapping, serialized as a JSON object.
///
/// Duplicate keys are preserved in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairs(pub Vec<(String, String)>);

impl Pairs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last value stored under exactly `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value stored under exactly `key`, or append it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut found = false;
        for (k, v) in self.0.iter_mut() {
            if *k == key {
                *v = value.clone();
                found = true;
            }
        }
        if !found {
            self.0.push((key, value));
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Pairs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for Pairs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct PairsVisitor;

impl<'de> Visitor<'de> for PairsVisitor {
    type Value = Pairs;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of strings to strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Pairs, A::Error> {
        let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, String>()? {
            pairs.push((k, v));
        }
        Ok(Pairs(pairs))
    }
}

impl<'de> Deserialize<'de> for Pairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PairsVisitor)
    }
}

/// Trigger-supplied request metadata. Only the deployment stage is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// An inbound HTTP request as delivered by a gateway trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub http_method: String,
    pub path: String,
    #[serde(default)]
    pub query_string_parameters: Option<Pairs>,
    #[serde(default)]
    pub headers: Option<Pairs>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<EventContext>,
}

impl InboundEvent {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Parse an event from a decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> GatewayResult<Self> {
        serde_json::from_value(value).map_err(|e| GatewayError::MalformedInput(e.to_string()))
    }

    /// Parse an event from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> GatewayResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| GatewayError::MalformedInput(e.to_string()))
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(Pairs::new).push(key, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(Pairs::new)
            .push(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.request_context = Some(EventContext {
            stage: Some(stage.into()),
        });
        self
    }

    /// The deployment stage name, if the trigger supplied one.
    pub fn stage(&self) -> Option<&str> {
        self.request_context.as_ref()?.stage.as_deref()
    }

    /// The request body as raw bytes, decoding base64 when flagged.
    pub fn body_bytes(&self) -> GatewayResult<Vec<u8>> {
        let Some(body) = self.body.as_deref() else {
            return Ok(Vec::new());
        };
        if self.is_base64_encoded {
            STANDARD
                .decode(body)
                .map_err(|e| GatewayError::MalformedInput(format!("invalid base64 body: {e}")))
        } else {
            Ok(body.as_bytes().to_vec())
        }
    }

    /// Length advertised as `CONTENT_LENGTH`.
    ///
    /// Text bodies count characters; base64 bodies count decoded bytes.
    pub fn content_length(&self, decoded: &[u8]) -> usize {
        match self.body.as_deref() {
            None => 0,
            Some(_) if self.is_base64_encoded => decoded.len(),
            Some(text) => text.chars().count(),
        }
    }
}

/// The response record returned to the gateway trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    pub status_code: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl OutboundEvent {
    /// Numeric status, or 500 when the captured status is not a number.
    pub fn status_u16(&self) -> u16 {
        self.status_code.parse().unwrap_or(500)
    }

    /// The body as raw bytes, decoding base64 when flagged.
    pub fn body_bytes(&self) -> GatewayResult<Vec<u8>> {
        if self.is_base64_encoded {
            STANDARD
                .decode(&self.body)
                .map_err(|e| GatewayError::MalformedInput(format!("invalid base64 body: {e}")))
        } else {
            Ok(self.body.clone().into_bytes())
        }
    }
}
