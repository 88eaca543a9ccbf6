use crate::domain::{CachedValue, StoredRecord};
use crate::events::CollectionChange;
use crate::ports::DocumentCollection;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Live view of a single cache key.
///
/// Yields the current state first, then the new state after every write to
/// the key: `Some` while an entry exists, `None` while it doesn't. The stream
/// never ends on its own; call [`LiveQuery::cancel`] or drop it to unregister.
pub struct LiveQuery<T> {
    key: String,
    inner: BoxStream<'static, Option<CachedValue<T>>>,
}

struct QueryState {
    key: String,
    collection: Arc<dyn DocumentCollection>,
    changes: BroadcastStream<CollectionChange>,
    initial: Option<Option<StoredRecord>>,
    // Revision last handed out, `Some(None)` when "no entry" was emitted
    last_revision: Option<Option<u64>>,
}

impl QueryState {
    /// Returns the record to emit, or `None` if the state is unchanged
    fn advance(&mut self, current: Option<StoredRecord>) -> Option<Option<StoredRecord>> {
        let revision = current.as_ref().map(|record| record.revision);
        if self.last_revision == Some(revision) {
            return None;
        }
        self.last_revision = Some(revision);
        Some(current)
    }
}

impl<T> LiveQuery<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// `changes` must be subscribed before `initial` was read
    pub(crate) fn new(
        key: impl Into<String>,
        collection: Arc<dyn DocumentCollection>,
        changes: broadcast::Receiver<CollectionChange>,
        initial: Option<StoredRecord>,
    ) -> Self {
        let key = key.into();
        let state = QueryState {
            key: key.clone(),
            collection,
            changes: BroadcastStream::new(changes),
            initial: Some(initial),
            last_revision: None,
        };

        let inner = stream::unfold(state, |mut state| async move {
            if let Some(initial) = state.initial.take() {
                state.last_revision = Some(initial.as_ref().map(|record| record.revision));
                return Some((decode::<T>(&state.key, initial), state));
            }

            loop {
                match state.changes.next().await? {
                    Ok(change) if change.key() != state.key => continue,
                    Ok(change) => {
                        let current = change.record().cloned();
                        let latest = match state.collection.find_one(&state.key).await {
                            Ok(latest) => latest,
                            Err(e) => {
                                tracing::warn!(
                                    "Live query for key '{}' could not re-read document: {}",
                                    state.key,
                                    e
                                );
                                current
                            }
                        };

                        if let Some(emit) = state.advance(latest) {
                            return Some((decode::<T>(&state.key, emit), state));
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Live query for key '{}' lagged by {} change(s), re-reading",
                            state.key,
                            skipped
                        );

                        match state.collection.find_one(&state.key).await {
                            Ok(latest) => {
                                if let Some(emit) = state.advance(latest) {
                                    return Some((decode::<T>(&state.key, emit), state));
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "Live query for key '{}' could not re-read document: {}",
                                    state.key,
                                    e
                                );
                            }
                        }
                    }
                }
            }
        });

        Self {
            key,
            inner: inner.boxed(),
        }
    }
}

impl<T> LiveQuery<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop observing the key and release the change feed registration
    pub fn cancel(self) {
        tracing::debug!("Live query for key '{}' cancelled", self.key);
    }
}

fn decode<T: DeserializeOwned>(key: &str, record: Option<StoredRecord>) -> Option<CachedValue<T>> {
    record.map(|record| CachedValue::from_payload(key, &record.entry.data))
}

impl<T> Stream for LiveQuery<T> {
    type Item = Option<CachedValue<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> std::fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery").field("key", &self.key).finish()
    }
}
