//! Due-channel selection.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ftrack_core::Channel;

use crate::store::{CollectionStore, StoreError};

/// Filter `channels` down to those due at `now` and order them so that
/// never-checked channels come first, then the longest overdue. At most
/// `cap` channels are returned; the rest wait for the next batch.
///
/// Ordering by overdue time keeps short-interval channels from starving
/// long-interval ones when the cap is hit.
#[must_use]
pub fn select_due(channels: Vec<Channel>, now: DateTime<Utc>, cap: usize) -> Vec<Channel> {
    let mut due: Vec<Channel> = channels
        .into_iter()
        .filter(|c| c.is_active && c.settings.is_due(now))
        .collect();

    due.sort_by(|a, b| {
        match (a.settings.overdue_secs(now), b.settings.overdue_secs(now)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        }
        .then(a.id.cmp(&b.id))
    });
    due.truncate(cap);
    due
}

/// Read collectable channels from the store and select the due ones.
///
/// # Errors
///
/// Returns [`StoreError`] if the registry cannot be read.
pub async fn find_due_channels(
    store: &dyn CollectionStore,
    now: DateTime<Utc>,
    cap: usize,
) -> Result<Vec<Channel>, StoreError> {
    let channels = store.list_collectable_channels().await?;
    Ok(select_due(channels, now, cap))
}
