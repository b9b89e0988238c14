// Status channel between the engine and whoever displays progress
use super::types::{RunSummary, StatusEvent};
use log::debug;
use tokio::sync::mpsc;

/// Sending half handed to the engine. Sends never block and never fail the
/// run; a dropped receiver just means nobody is listening.
#[derive(Debug, Clone, Default)]
pub struct StatusSender {
    tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusSender {
    /// A sender that only logs.
    pub fn detached() -> Self {
        StatusSender { tx: None }
    }

    pub fn progress(&self, line: impl Into<String>) {
        let line = line.into();
        debug!("status: {line}");
        if let Some(tx) = &self.tx {
            let _ = tx.send(StatusEvent::Progress(line));
        }
    }

    pub fn finished(&self, summary: &RunSummary) {
        debug!("status: {summary}");
        if let Some(tx) = &self.tx {
            let _ = tx.send(StatusEvent::Finished(summary.clone()));
        }
    }
}

/// Helper function to create the status channel
pub fn create_status_channel() -> (StatusSender, mpsc::UnboundedReceiver<StatusEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusSender { tx: Some(tx) }, rx)
}
