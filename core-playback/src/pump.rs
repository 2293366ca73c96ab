//! # Transport Event Pump
//!
//! Transport callbacks arrive on whatever thread the audio device uses. The
//! pump drains them from one channel in order, so position updates and
//! end-of-song signals are applied one at a time.

use crate::engine::PlaybackEngine;
use crate::traits::TransportCallback;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Consumer of transport callbacks.
#[async_trait]
pub trait TransportEventHandler: Send + Sync {
    async fn on_transport_event(&self, callback: TransportCallback);
}

#[async_trait]
impl TransportEventHandler for PlaybackEngine {
    async fn on_transport_event(&self, callback: TransportCallback) {
        match self.handle_transport_event(callback).await {
            Ok(Some(correction)) => debug!(
                track_id = %correction.song_id,
                duration = correction.duration,
                "Duration correction not persisted by bare engine"
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Transport event handling failed"),
        }
    }
}

/// Spawn a task feeding `rx` into `handler` until every sender is dropped.
pub fn spawn_transport_pump<H>(
    handler: Arc<H>,
    mut rx: mpsc::UnboundedReceiver<TransportCallback>,
) -> JoinHandle<()>
where
    H: TransportEventHandler + ?Sized + 'static,
{
    tokio::spawn(async move {
        while let Some(callback) = rx.recv().await {
            handler.on_transport_event(callback).await;
        }
        debug!("Transport event channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TransportEvent;
    use core_library::LocatorRegistry;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<TransportCallback>>,
    }

    #[async_trait]
    impl TransportEventHandler for Recorder {
        async fn on_transport_event(&self, callback: TransportCallback) {
            self.seen.lock().push(callback);
        }
    }

    #[tokio::test]
    async fn pump_preserves_order_and_stops_when_closed() {
        let locators = LocatorRegistry::new();
        let first = locators.issue("a", bytes::Bytes::from_static(b"a"));
        let second = locators.issue("b", bytes::Bytes::from_static(b"b"));

        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_transport_pump(recorder.clone(), rx);

        tx.send(TransportEvent::Loaded { duration: 3.0 }.for_source(&first)).unwrap();
        tx.send(TransportEvent::Ended.for_source(&first)).unwrap();
        tx.send(TransportEvent::TimeUpdate(1.0).for_source(&second)).unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(
            *recorder.seen.lock(),
            vec![
                TransportCallback::new(first.clone(), TransportEvent::Loaded { duration: 3.0 }),
                TransportCallback::new(first, TransportEvent::Ended),
                TransportCallback::new(second, TransportEvent::TimeUpdate(1.0)),
            ]
        );
    }
}
