//! Correlation of one outstanding report request.
//!
//! A report is requested with a `want_config_id`; the radio answers with a
//! stream of `node_info` / `channel` messages and finishes with a
//! `config_complete_id` echoing the id. Only one request is tracked at a time.

use mtlink_protocol::{ChannelReport, NodeReport, ReportProgress};
use tracing::debug;

/// Receives the entries of a requested report.
///
/// Every entry arrives with [`ReportProgress::InProgress`] and a snapshot;
/// the report ends with `(None, Done)` or `(None, Invalid)`. Snapshots are
/// only valid for the duration of the call.
pub trait ReportHandler {
    /// A node entry, or the end of the report.
    fn on_node_report(&mut self, report: Option<&NodeReport>, progress: ReportProgress);

    /// A channel entry, or the end of the report.
    fn on_channel_report(&mut self, _report: Option<&ChannelReport>, _progress: ReportProgress) {}
}

impl<F> ReportHandler for F
where
    F: FnMut(Option<&NodeReport>, ReportProgress),
{
    fn on_node_report(&mut self, report: Option<&NodeReport>, progress: ReportProgress) {
        self(report, progress)
    }
}

/// How a `config_complete_id` was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The id matched; the session is now disarmed.
    Done,
    /// The id did not match; the session stays armed.
    Mismatch {
        /// The id the session is waiting for.
        expected: u32,
    },
    /// No request is outstanding.
    NoSession,
}

/// The armed/disarmed state of one report request.
#[derive(Default)]
pub struct ReportSession {
    correlation_id: Option<u32>,
    handler: Option<Box<dyn ReportHandler>>,
}

impl std::fmt::Debug for ReportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSession")
            .field("correlation_id", &self.correlation_id)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl ReportSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for the report tagged `correlation_id`.
    ///
    /// An already armed session is replaced; its handler is dropped without a
    /// terminal callback.
    pub fn arm(&mut self, correlation_id: u32, handler: Box<dyn ReportHandler>) {
        if let Some(previous) = self.correlation_id.filter(|_| self.handler.is_some()) {
            debug!(
                "ReportSession: request {} replaces outstanding request {}",
                correlation_id, previous
            );
        }
        self.correlation_id = Some(correlation_id);
        self.handler = Some(handler);
    }

    /// Whether a request is outstanding.
    pub fn is_armed(&self) -> bool {
        self.correlation_id.is_some() && self.handler.is_some()
    }

    /// The id of the outstanding request.
    pub fn correlation_id(&self) -> Option<u32> {
        self.correlation_id.filter(|_| self.handler.is_some())
    }

    /// Forward a node entry. Returns false if no request is outstanding.
    pub fn notify_node(&mut self, report: &NodeReport) -> bool {
        match self.handler.as_mut() {
            Some(handler) => {
                handler.on_node_report(Some(report), ReportProgress::InProgress);
                true
            }
            None => false,
        }
    }

    /// Forward a channel entry. Returns false if no request is outstanding.
    pub fn notify_channel(&mut self, report: &ChannelReport) -> bool {
        match self.handler.as_mut() {
            Some(handler) => {
                handler.on_channel_report(Some(report), ReportProgress::InProgress);
                true
            }
            None => false,
        }
    }

    /// Resolve a `config_complete_id`.
    pub fn resolve(&mut self, config_complete_id: u32) -> Resolution {
        let (Some(expected), Some(handler)) = (self.correlation_id, self.handler.as_mut()) else {
            return Resolution::NoSession;
        };

        if expected != config_complete_id {
            handler.on_node_report(None, ReportProgress::Invalid);
            handler.on_channel_report(None, ReportProgress::Invalid);
            return Resolution::Mismatch { expected };
        }

        handler.on_node_report(None, ReportProgress::Done);
        handler.on_channel_report(None, ReportProgress::Done);
        self.correlation_id = None;
        self.handler = None;
        Resolution::Done
    }
}
