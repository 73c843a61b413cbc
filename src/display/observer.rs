//! Observer Bus
//!
//! Fan-out of display change events to subscribers.

use enumflags2::BitFlags;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::logical::LogicalDisplay;
use super::reconcile::DisplayMetric;

/// Display event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    /// Display joined the active set
    Added(LogicalDisplay),

    /// Display left the active set (owned snapshot)
    Removed(LogicalDisplay),

    /// Display properties changed
    MetricsChanged {
        display: LogicalDisplay,
        metrics: BitFlags<DisplayMetric>,
    },
}

/// Subscriber to display changes
///
/// All methods default to no-ops so observers implement only what they need.
pub trait DisplayObserver {
    fn on_display_added(&mut self, _display: &LogicalDisplay) {}

    fn on_display_removed(&mut self, _display: &LogicalDisplay) {}

    fn on_display_metrics_changed(
        &mut self,
        _display: &LogicalDisplay,
        _metrics: BitFlags<DisplayMetric>,
    ) {
    }
}

/// Handle returned by [`ObserverBus::add_observer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered list of observers, notified in registration order
#[derive(Default)]
pub struct ObserverBus {
    observers: Vec<(ObserverId, Box<dyn DisplayObserver>)>,
    next_id: u64,
}

impl std::fmt::Debug for ObserverBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn DisplayObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        debug!("Added display observer {:?}", id);
        id
    }

    /// Returns false if the id was not registered
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver one event to every observer
    pub fn notify(&mut self, event: &DisplayEvent) {
        trace!("Dispatching {:?}", event);
        for (_, observer) in self.observers.iter_mut() {
            match event {
                DisplayEvent::Added(display) => observer.on_display_added(display),
                DisplayEvent::Removed(display) => observer.on_display_removed(display),
                DisplayEvent::MetricsChanged { display, metrics } => {
                    observer.on_display_metrics_changed(display, *metrics)
                }
            }
        }
    }

    pub fn notify_all(&mut self, events: &[DisplayEvent]) {
        for event in events {
            self.notify(event);
        }
    }
}

/// Observer forwarding every event into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<DisplayEvent>) -> Self {
        Self { sender }
    }

    /// Observer plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    fn forward(&self, event: DisplayEvent) {
        if self.sender.send(event).is_err() {
            trace!("Display event receiver dropped");
        }
    }
}

impl DisplayObserver for ChannelObserver {
    fn on_display_added(&mut self, display: &LogicalDisplay) {
        self.forward(DisplayEvent::Added(display.clone()));
    }

    fn on_display_removed(&mut self, display: &LogicalDisplay) {
        self.forward(DisplayEvent::Removed(display.clone()));
    }

    fn on_display_metrics_changed(
        &mut self,
        display: &LogicalDisplay,
        metrics: BitFlags<DisplayMetric>,
    ) {
        self.forward(DisplayEvent::MetricsChanged {
            display: display.clone(),
            metrics,
        });
    }
}
