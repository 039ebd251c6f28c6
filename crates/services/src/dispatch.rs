use std::sync::Arc;

use beacon_core::model::Endpoint;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use transport::{EventSink, TransportError};

/// Handle to one in-flight delivery.
///
/// Callers are free to drop it; the send keeps running. Tests await
/// `settled()` to observe the outcome deterministically.
#[derive(Debug)]
pub struct Delivery(Option<JoinHandle<()>>);

impl Delivery {
    fn dropped() -> Self {
        Self(None)
    }

    /// Wait until the send has finished, successfully or not.
    pub async fn settled(self) {
        if let Some(handle) = self.0 {
            if let Err(err) = handle.await {
                log::warn!("delivery task did not finish: {err}");
            }
        }
    }

    /// Whether a send was actually started.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.0.is_some()
    }
}

/// Fire-and-forget hand-off from the tracker to an `EventSink`.
///
/// `dispatch` returns immediately. The spawned send produces a
/// `Result<(), TransportError>` whose error branch is logged and dropped
/// here; nothing upstream of this type handles delivery errors.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn EventSink>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Serialize `payload` and send it to `endpoint` in the background.
    ///
    /// Must be called from within a Tokio runtime; outside of one the event
    /// is logged and dropped.
    pub fn dispatch<T: Serialize>(&self, endpoint: Endpoint, label: &str, payload: &T) -> Delivery {
        let body = serde_json::to_value(payload);
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("no async runtime; dropping {label} for {}", endpoint.path());
            return Delivery::dropped();
        };

        let sink = Arc::clone(&self.sink);
        let label = label.to_string();
        let handle = runtime.spawn(async move {
            match deliver(sink.as_ref(), endpoint, body).await {
                Ok(()) => log::debug!("delivered {label} to {}", endpoint.path()),
                // Delivery errors end here.
                Err(err) => log::warn!("failed to deliver {label} to {}: {err}", endpoint.path()),
            }
        });
        Delivery(Some(handle))
    }
}

async fn deliver(
    sink: &dyn EventSink,
    endpoint: Endpoint,
    body: Result<Value, serde_json::Error>,
) -> Result<(), TransportError> {
    let body = body?;
    sink.send(endpoint.path(), &body).await
}
