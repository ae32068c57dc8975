//! Widget events
//!
//! Every widget publishes what happens to it on a broadcast channel. An
//! [`EventStream`] is one subscriber; it can be polled with `next()` or turned
//! into a `futures::Stream`.

use futures::stream::{self, Stream};
use stationcam_core::{DeliveryStatus, ScanResult, WarehouseDelivery};
use stationcam_media::CameraEvent;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::debug;

/// Which widget emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// Live camera feed viewer
    LiveFeed,
    /// Product identification scanner
    ProductScanner,
    /// Package label scanner
    QrScanner,
}

impl WidgetKind {
    /// Short name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::LiveFeed => "live-feed",
            WidgetKind::ProductScanner => "product-scanner",
            WidgetKind::QrScanner => "qr-scanner",
        }
    }
}

/// Events a widget can emit
#[derive(Debug, Clone)]
pub enum WidgetEvent {
    /// Forwarded camera lifecycle event
    Camera {
        /// Emitting widget
        widget: WidgetKind,
        /// Camera event
        event: CameraEvent,
    },
    /// The scan flow moved to a new state
    FlowChanged {
        /// Emitting widget
        widget: WidgetKind,
        /// New state label
        state: &'static str,
    },
    /// A scan is waiting for confirmation or final
    ScanIdentified {
        /// Emitting widget
        widget: WidgetKind,
        /// The scan
        scan: ScanResult,
    },
    /// A scan was accepted by the submission service
    ScanSubmitted {
        /// Emitting widget
        widget: WidgetKind,
        /// Confirmation token
        token: String,
    },
    /// A robot delivery task was created
    DeliveryTaskCreated {
        /// The new task
        delivery: WarehouseDelivery,
    },
    /// A package delivery state was reported
    DeliveryStatusUpdated {
        /// Reported status
        status: DeliveryStatus,
    },
    /// A screenshot was written to disk
    ScreenshotSaved {
        /// File written
        path: PathBuf,
    },
    /// Something failed; the widget is back in a retryable state
    Error {
        /// Emitting widget
        widget: WidgetKind,
        /// User-facing message
        message: String,
    },
}

impl WidgetEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            WidgetEvent::Camera { .. } => "camera",
            WidgetEvent::FlowChanged { .. } => "flow_changed",
            WidgetEvent::ScanIdentified { .. } => "scan_identified",
            WidgetEvent::ScanSubmitted { .. } => "scan_submitted",
            WidgetEvent::DeliveryTaskCreated { .. } => "delivery_task_created",
            WidgetEvent::DeliveryStatusUpdated { .. } => "delivery_status_updated",
            WidgetEvent::ScreenshotSaved { .. } => "screenshot_saved",
            WidgetEvent::Error { .. } => "error",
        }
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        match self {
            WidgetEvent::Error { .. } => true,
            WidgetEvent::Camera { event, .. } => matches!(event, CameraEvent::CameraError { .. }),
            _ => false,
        }
    }
}

/// Sending side shared by a widget's parts
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<WidgetEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(128);
        Self { tx }
    }

    pub(crate) fn emit(&self, event: WidgetEvent) {
        debug!("Widget event: {}", event.event_type());
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> EventStream {
        EventStream::new(self.tx.subscribe())
    }
}

/// Stream of widget events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<WidgetEvent>,
}

impl EventStream {
    /// Wrap a broadcast receiver
    pub fn new(receiver: broadcast::Receiver<WidgetEvent>) -> Self {
        Self { receiver }
    }

    /// Next event; `None` once the widget is gone. Events dropped because
    /// this subscriber fell behind are skipped.
    pub async fn next(&mut self) -> Option<WidgetEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Event stream lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued
    pub fn try_next(&mut self) -> Option<WidgetEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain everything queued right now
    pub fn drain(&mut self) -> Vec<WidgetEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = WidgetEvent> {
        stream::unfold(self, |mut events| async move {
            events.next().await.map(|event| (event, events))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_yields_in_order() {
        let bus = EventBus::new();
        let events = bus.subscribe();

        bus.emit(WidgetEvent::FlowChanged {
            widget: WidgetKind::QrScanner,
            state: "capturing",
        });
        bus.emit(WidgetEvent::Error {
            widget: WidgetKind::QrScanner,
            message: "boom".to_string(),
        });
        drop(bus);

        let collected: Vec<_> = events.into_stream().collect().await;
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].event_type(), "flow_changed");
        assert!(collected[1].is_error_event());
    }

    #[test]
    fn test_try_next_on_empty() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        assert!(events.try_next().is_none());

        bus.emit(WidgetEvent::Camera {
            widget: WidgetKind::LiveFeed,
            event: CameraEvent::CameraError {
                message: "denied".to_string(),
            },
        });
        let drained = events.drain();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].is_error_event());
    }
}
