//! In-memory recipient directory.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Channel, ChannelCursor, ChannelPage, DirectoryError, RecipientDirectory};
use crate::util::{ChannelId, PrincipalId};

#[derive(Default)]
struct DirectoryState {
    channels: BTreeMap<ChannelId, Channel>,
    by_principal: HashMap<PrincipalId, BTreeSet<ChannelId>>,
    by_channel: HashMap<ChannelId, BTreeSet<PrincipalId>>,
}

/// Channels and principal associations kept in process memory.
///
/// All mutations take a single lock, so deleting a channel together with its
/// associations is atomic with respect to readers.
#[derive(Default)]
pub struct InMemoryRecipientDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryRecipientDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a channel (replacing any previous record) and associate it with `principal_id`.
    pub fn register_channel(&self, principal_id: impl Into<PrincipalId>, channel: Channel) {
        let principal_id = principal_id.into();
        let mut state = self.state.lock();
        let channel_id = channel.channel_id.clone();
        state.channels.insert(channel_id.clone(), channel);
        state
            .by_principal
            .entry(principal_id.clone())
            .or_default()
            .insert(channel_id.clone());
        state.by_channel.entry(channel_id).or_default().insert(principal_id);
    }

    /// Associate an existing channel with another principal.
    pub fn associate(
        &self,
        principal_id: impl Into<PrincipalId>,
        channel_id: &ChannelId,
    ) -> Result<(), DirectoryError> {
        let principal_id = principal_id.into();
        let mut state = self.state.lock();
        if !state.channels.contains_key(channel_id) {
            return Err(DirectoryError::NotFound(channel_id.clone()));
        }
        state
            .by_principal
            .entry(principal_id.clone())
            .or_default()
            .insert(channel_id.clone());
        state
            .by_channel
            .entry(channel_id.clone())
            .or_default()
            .insert(principal_id);
        Ok(())
    }

    /// Principals associated with a channel.
    #[must_use]
    pub fn principals_for(&self, channel_id: &ChannelId) -> Vec<PrincipalId> {
        self.state
            .lock()
            .by_channel
            .get(channel_id)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a channel record exists.
    #[must_use]
    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.state.lock().channels.contains_key(channel_id)
    }

    /// Number of stored channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryRecipientDirectory {
    async fn channels_for(&self, principal_id: &PrincipalId) -> Result<Vec<Channel>, DirectoryError> {
        let state = self.state.lock();
        Ok(state
            .by_principal
            .get(principal_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.channels.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_channels(
        &self,
        cursor: Option<ChannelCursor>,
        limit: usize,
    ) -> Result<ChannelPage, DirectoryError> {
        let limit = limit.max(1);
        let state = self.state.lock();
        let lower = cursor.map_or(Bound::Unbounded, |c| Bound::Excluded(c.after));
        let mut iter = state.channels.range((lower, Bound::Unbounded));
        let channels: Vec<Channel> = iter
            .by_ref()
            .take(limit)
            .map(|(_, channel)| channel.clone())
            .collect();
        let next = match (iter.next(), channels.last()) {
            (Some(_), Some(last)) => Some(ChannelCursor {
                after: last.channel_id.clone(),
            }),
            _ => None,
        };
        Ok(ChannelPage { channels, next })
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), DirectoryError> {
        let mut state = self.state.lock();
        if state.channels.remove(channel_id).is_none() {
            return Err(DirectoryError::NotFound(channel_id.clone()));
        }
        if let Some(principals) = state.by_channel.remove(channel_id) {
            for principal_id in principals {
                let now_empty = state.by_principal.get_mut(&principal_id).is_some_and(|ids| {
                    ids.remove(channel_id);
                    ids.is_empty()
                });
                if now_empty {
                    state.by_principal.remove(&principal_id);
                }
            }
        }
        Ok(())
    }
}
