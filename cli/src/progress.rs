//! Fire-and-forget progress events
//!
//! Stages publish what they are doing here; nothing in the pipeline waits on
//! or reads back from the receiver, so a closed or absent receiver never
//! changes the outcome of a run.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Progress emitted while a deploy runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    BundleStarted,
    BundleCompleted,
    /// A line of image-builder output
    BuildLog(String),
    /// A line streamed back by the control plane while finalizing
    DeployLog(String),
}

/// Sending half of the progress channel
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// A sink that drops every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A connected sink and its receiver
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
