//! Message models exchanged with the hub
//!
//! `Message` is the canonical envelope for telemetry, cloud-to-device and
//! module input/output traffic. Method invocations travel as
//! `MethodRequest`/`MethodResponse` pairs.

use crate::inbox::InboxCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// Message envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw payload
    pub data: Vec<u8>,
    /// Unique identifier, generated when the envelope is created
    pub message_id: String,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    /// Module output the message is sent to
    pub output_name: Option<String>,
    /// Module input the message arrived on
    pub input_name: Option<String>,
    /// Application-defined properties
    pub custom_properties: HashMap<String, String>,
}

impl Message {
    /// Create an envelope around a payload
    pub fn new<D: Into<Vec<u8>>>(data: D) -> Self {
        Self {
            data: data.into(),
            message_id: Uuid::new_v4().to_string(),
            content_type: None,
            content_encoding: None,
            output_name: None,
            input_name: None,
            custom_properties: HashMap::new(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    pub fn with_input_name<S: Into<String>>(mut self, input_name: S) -> Self {
        self.input_name = Some(input_name.into());
        self
    }

    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }

    /// Payload as UTF-8 text, if it is valid UTF-8
    pub fn data_as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.data).ok()
    }
}

impl From<&str> for Message {
    fn from(data: &str) -> Self {
        Message::new(data)
    }
}

impl From<String> for Message {
    fn from(data: String) -> Self {
        Message::new(data)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::new(data)
    }
}

impl From<&[u8]> for Message {
    fn from(data: &[u8]) -> Self {
        Message::new(data)
    }
}

impl From<serde_json::Value> for Message {
    fn from(value: serde_json::Value) -> Self {
        Message::new(value.to_string())
            .with_content_type("application/json")
            .with_content_encoding("utf-8")
    }
}

// ----------------------------------------------------------------------------
// Method Invocation
// ----------------------------------------------------------------------------

/// Direct method invocation received from the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRequest {
    pub request_id: String,
    pub name: String,
    pub payload: serde_json::Value,
}

impl MethodRequest {
    pub fn new<R: Into<String>, N: Into<String>>(
        request_id: R,
        name: N,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            name: name.into(),
            payload,
        }
    }
}

/// Response to a method invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    pub request_id: String,
    pub status: u16,
    pub payload: Option<serde_json::Value>,
}

impl MethodResponse {
    pub fn new<R: Into<String>>(request_id: R, status: u16, payload: Option<serde_json::Value>) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            payload,
        }
    }

    /// Build a response correlated with `request`
    pub fn from_request(
        request: &MethodRequest,
        status: u16,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self::new(request.request_id.clone(), status, payload)
    }
}

// ----------------------------------------------------------------------------
// Inbound Events
// ----------------------------------------------------------------------------

/// Unsolicited event published by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    MethodRequest(MethodRequest),
    C2dMessage(Message),
    InputMessage(Message),
}

impl InboundEvent {
    pub fn category(&self) -> InboxCategory {
        match self {
            InboundEvent::MethodRequest(_) => InboxCategory::MethodRequests,
            InboundEvent::C2dMessage(_) => InboxCategory::C2dMessages,
            InboundEvent::InputMessage(_) => InboxCategory::InputMessages,
        }
    }

    /// Name the event is demultiplexed on, if its category is keyed
    pub fn routing_key(&self) -> Option<&str> {
        match self {
            InboundEvent::MethodRequest(request) => Some(request.name.as_str()),
            InboundEvent::C2dMessage(_) => None,
            InboundEvent::InputMessage(message) => message.input_name.as_deref(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
