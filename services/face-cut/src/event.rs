//! Webhook payload types.
//!
//! A trigger delivers `{"messages": [...]}`. Every element wraps a JSON string
//! (`details.message.body`) that carries the actual face payload. Elements
//! are kept as raw JSON until they are processed so that one malformed
//! element does not reject the whole batch.

use crate::error::ProcessError;
use serde::{Deserialize, Serialize};

/// Body of an inbound webhook call
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    /// Raw event messages, parsed one by one
    pub messages: Vec<serde_json::Value>,
}

/// Single event message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub details: EventDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
    pub message: QueueMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// JSON-encoded [`FacePayload`]
    pub body: String,
}

/// Photo reference and detected face outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacePayload {
    /// Key of the source photo in the photo bucket
    pub object_key: String,
    /// Corner points of the detected face
    pub face: Vec<Point>,
}

/// Point in source image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl EventMessage {
    /// Parse an envelope out of a raw batch element
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProcessError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Decode the inner body
    pub fn payload(&self) -> Result<FacePayload, ProcessError> {
        Ok(serde_json::from_str(&self.details.message.body)?)
    }

    /// Wrap a payload the way the trigger does
    pub fn wrap(payload: &FacePayload) -> Result<Self, ProcessError> {
        Ok(Self {
            details: EventDetails {
                message: QueueMessage {
                    body: serde_json::to_string(payload)?,
                },
            },
        })
    }
}
