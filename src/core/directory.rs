//! Recipient directory contract.

use async_trait::async_trait;

use crate::core::{Channel, ChannelCursor, ChannelPage, DirectoryError};
use crate::util::{ChannelId, PrincipalId};

/// Durable store of channels and principal associations.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// All channels associated with a principal.
    async fn channels_for(&self, principal_id: &PrincipalId) -> Result<Vec<Channel>, DirectoryError>;

    /// Enumerate every channel in id order, starting after `cursor`.
    async fn list_channels(
        &self,
        cursor: Option<ChannelCursor>,
        limit: usize,
    ) -> Result<ChannelPage, DirectoryError>;

    /// Delete a channel and all of its principal associations atomically.
    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), DirectoryError>;
}
