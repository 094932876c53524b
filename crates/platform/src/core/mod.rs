//! Core platform abstractions and context management

use envbake_events::{AppEvent, EventEmitter, EventMeta, EventSender};

/// Context for platform operations, providing event emission and metadata tracking
///
/// One context is created per step; events emitted through it are labelled
/// with the step name and carry the run's correlation id.
#[derive(Debug, Clone, Default)]
pub struct PlatformContext {
    event_sender: Option<EventSender>,
    step: Option<String>,
    correlation_id: Option<String>,
}

impl PlatformContext {
    /// Create a new platform context with event emission capabilities
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self {
            event_sender,
            step: None,
            correlation_id: None,
        }
    }

    /// Context for the operations of one step
    #[must_use]
    pub fn for_step(event_sender: Option<EventSender>, step: impl Into<String>) -> Self {
        Self {
            event_sender,
            step: Some(step.into()),
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Name of the step this context belongs to
    #[must_use]
    pub fn step(&self) -> &str {
        self.step.as_deref().unwrap_or("<none>")
    }
}

impl EventEmitter for PlatformContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }

    fn enrich_event_meta(&self, _event: &AppEvent, meta: &mut EventMeta) {
        if let Some(step) = &self.step {
            meta.labels.insert("step".to_string(), step.clone());
        }
        if meta.correlation_id.is_none() {
            meta.correlation_id.clone_from(&self.correlation_id);
        }
    }
}
