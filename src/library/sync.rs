use super::models::decode_children;
use crate::database::{Database, DatabaseError};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Mirrors one backend collection as a live sequence of decoded record
/// lists.
///
/// On every backend change the entire collection state is re-decoded into a
/// fresh list and published whole, so consumers never observe a partially
/// updated snapshot.
pub struct ListSynchronizer<T> {
    db: Arc<dyn Database>,
    path: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ListSynchronizer<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(db: Arc<dyn Database>, path: impl Into<String>) -> Self {
        Self {
            db,
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Reads and decodes the collection once, without subscribing.
    pub async fn load_once(&self) -> Result<Vec<T>, DatabaseError> {
        match self.db.read_once(&self.path).await? {
            Some(snapshot) => Ok(decode_children(&snapshot)),
            None => Ok(Vec::new()),
        }
    }

    /// Opens the live feed and starts publishing snapshots.
    ///
    /// The first publication is the collection's current state; one follows
    /// for every subsequent backend change. Dropping the returned
    /// `Subscription` tears the feed down.
    pub async fn subscribe(&self) -> Result<Subscription<T>, DatabaseError> {
        let mut stream = self.db.subscribe(&self.path).await?;
        let (tx, rx) = watch::channel(Vec::new());
        let path = self.path.clone();

        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(snapshot) => {
                        let records = decode_children::<T>(&snapshot);
                        if tx.send(records).is_err() {
                            // Every receiver is gone.
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "live feed error, stopping");
                        break;
                    }
                }
            }
        });

        Ok(Subscription { rx, task })
    }
}

/// Handle to a live collection feed.
///
/// Holds the background decode task; dropping the subscription aborts it,
/// guaranteeing no further updates are delivered to any receiver.
pub struct Subscription<T> {
    rx: watch::Receiver<Vec<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> Subscription<T> {
    /// A receiver observing every published snapshot.
    pub fn snapshots(&self) -> watch::Receiver<Vec<T>> {
        self.rx.clone()
    }

    /// The most recently published snapshot (empty until the first
    /// publication arrives).
    pub fn current(&self) -> Vec<T> {
        self.rx.borrow().clone()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
