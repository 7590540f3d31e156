//! Web messages exchanged between the host and the loaded page.
//!
//! Pages send with `window.chrome.webview.postMessage({ type, payload, id })`
//! and listen with `window.chrome.webview.addEventListener('message', ...)`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// A message from the page to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A message from the host to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Id of the page message this answers
    #[serde(default, rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl HostMessage {
    #[must_use]
    pub fn new(message_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            reply_to: None,
        }
    }

    /// Answer a page message that carried an id.
    #[must_use]
    pub fn reply(to: &PageMessage, payload: serde_json::Value) -> Option<Self> {
        to.id.as_ref().map(|id| Self {
            message_type: "reply".to_string(),
            payload,
            reply_to: Some(id.clone()),
        })
    }
}

/// Queue of page messages waiting to be polled by the host.
///
/// Clones share the same queue, so one clone can live inside the platform's
/// message callback while another is drained from the event loop.
#[derive(Debug, Clone, Default)]
pub struct MessageInbox {
    queue: Arc<Mutex<VecDeque<PageMessage>>>,
}

impl MessageInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw JSON message and queue it. Malformed messages are dropped.
    pub fn receive(&self, json: &str) {
        match serde_json::from_str::<PageMessage>(json) {
            Ok(message) => {
                tracing::debug!("Received page message: {}", message.message_type);
                self.queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(message);
            }
            Err(e) => {
                tracing::warn!("Dropping malformed page message: {}", e);
            }
        }
    }

    /// Take every queued message, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<PageMessage> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
