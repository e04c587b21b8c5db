use ftrack_core::{Channel, DedupKey, RawItem};

use crate::store::{CollectionStore, StoreError};

/// Whether `item` was already collected for this channel's forecaster on
/// this platform. History never expires.
///
/// # Errors
///
/// Returns [`StoreError`] if the ledger cannot be read.
pub async fn is_duplicate(
    store: &dyn CollectionStore,
    channel: &Channel,
    item: &RawItem,
) -> Result<bool, StoreError> {
    store.is_collected(&DedupKey::for_item(channel, item)).await
}
