//! Notification channels registered by principals.

use serde::{Deserialize, Serialize};

use crate::util::ChannelId;

/// A registered notification endpoint (push or messaging destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    pub channel_id: ChannelId,
    /// Transport-specific address; `None` when registration never produced one.
    pub handle: Option<String>,
    /// Registration time in milliseconds since epoch.
    pub registered_at_ms: u128,
}

impl Channel {
    /// Create a channel with a handle.
    pub fn new(channel_id: impl Into<ChannelId>, handle: impl Into<String>, registered_at_ms: u128) -> Self {
        Self {
            channel_id: channel_id.into(),
            handle: Some(handle.into()),
            registered_at_ms,
        }
    }

    /// Create a channel that has no handle.
    pub fn without_handle(channel_id: impl Into<ChannelId>, registered_at_ms: u128) -> Self {
        Self {
            channel_id: channel_id.into(),
            handle: None,
            registered_at_ms,
        }
    }

    /// The handle, if it can be used for delivery (present and not blank).
    #[must_use]
    pub fn usable_handle(&self) -> Option<&str> {
        self.handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

/// Liveness reported by a transport probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHealth {
    /// The channel accepts messages.
    Alive,
    /// The channel is permanently invalid.
    Disabled,
}

/// Position in a channel enumeration; the next page starts after this id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCursor {
    /// Last channel id returned by the previous page.
    pub after: ChannelId,
}

/// One page of a channel enumeration.
#[derive(Debug, Clone, Default)]
pub struct ChannelPage {
    /// Channels in ascending id order.
    pub channels: Vec<Channel>,
    /// Cursor for the next page, `None` when exhausted.
    pub next: Option<ChannelCursor>,
}
