//! Metric declarations for the radio link client.
//!
//! Every metric the client records is declared here as a [`Metric`] constant,
//! so names and label keys live in one place. The `metrics` crate is
//! re-exported; without an installed recorder all recording calls are no-ops.
//!
//! # Example
//!
//! ```rust,ignore
//! use mtlink_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::new("base", "tcp");
//! metrics::counter!(metric_defs::FRAMES_RECEIVED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use mtlink_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const RETRIES: Metric = Metric::counter("mtlink.retries")
///     .with_description("Connect retries")
///     .with_unit(Unit::Count)
///     .with_labels(&["link"]);
///
/// assert_eq!(RETRIES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "mtlink.frames.received").
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description)
            }
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }
}

/// All metrics recorded by the client.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every link-scoped metric.
    pub const STANDARD_LABELS: &[&str] = &["link", "transport"];

    // ========================================================================
    // Framing
    // ========================================================================

    /// Complete frames cut from the byte stream.
    pub const FRAMES_RECEIVED: Metric = Metric::counter("mtlink.frames.received")
        .with_description("Complete frames extracted from the byte stream")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Payload size of received frames.
    pub const FRAME_PAYLOAD_SIZE: Metric = Metric::histogram("mtlink.frames.payload_size")
        .with_description("Payload size of received frames")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Times the decode buffer was discarded after a bad magic.
    pub const FRAME_RESYNCS: Metric = Metric::counter("mtlink.frames.resyncs")
        .with_description("Decode buffer discarded after a corrupt frame header")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Frame headers declaring a payload larger than the buffer.
    pub const OVERSIZE_FRAMES: Metric = Metric::counter("mtlink.frames.oversize")
        .with_description("Frame headers declaring an oversize payload")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Received bytes dropped because the decode buffer was full.
    pub const BYTES_DROPPED: Metric = Metric::counter("mtlink.bytes.dropped")
        .with_description("Received bytes dropped on a full decode buffer")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Frames whose payload failed to decode.
    pub const DECODE_FAILURES: Metric = Metric::counter("mtlink.decode.failures")
        .with_description("Frames whose payload could not be decoded")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Messages routed by the dispatcher.
    ///
    /// Labels: link, transport, kind
    pub const MESSAGES_DISPATCHED: Metric = Metric::counter("mtlink.messages.dispatched")
        .with_description("Decoded messages routed by kind")
        .with_unit(Unit::Count)
        .with_labels(&["link", "transport", "kind"]);

    /// Messages of a kind the dispatcher has no route for.
    pub const UNKNOWN_VARIANTS: Metric = Metric::counter("mtlink.messages.unknown")
        .with_description("Decoded messages with no dispatcher route")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Report terminations.
    ///
    /// Labels: link, transport, outcome (done | invalid)
    pub const REPORT_OUTCOMES: Metric = Metric::counter("mtlink.reports.completed")
        .with_description("Report completions by outcome")
        .with_unit(Unit::Count)
        .with_labels(&["link", "transport", "outcome"]);

    // ========================================================================
    // Outbound and link
    // ========================================================================

    /// Heartbeats sent.
    pub const HEARTBEATS_SENT: Metric = Metric::counter("mtlink.heartbeats.sent")
        .with_description("Keep-alive messages sent")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Frames the transport did not fully accept.
    pub const SEND_FAILURES: Metric = Metric::counter("mtlink.send.failures")
        .with_description("Outbound frames not fully accepted by the transport")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Times the link came up.
    pub const LINK_ESTABLISHED: Metric = Metric::counter("mtlink.link.established")
        .with_description("Times the link came up")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// 1 while the link is up, 0 otherwise.
    pub const LINK_UP: Metric = Metric::gauge("mtlink.link.up")
        .with_description("Whether the link is currently connected")
        .with_labels(STANDARD_LABELS);

    /// All metric definitions, for bulk registration.
    pub const ALL: &[&Metric] = &[
        &FRAMES_RECEIVED,
        &FRAME_PAYLOAD_SIZE,
        &FRAME_RESYNCS,
        &OVERSIZE_FRAMES,
        &BYTES_DROPPED,
        &DECODE_FAILURES,
        &MESSAGES_DISPATCHED,
        &UNKNOWN_VARIANTS,
        &REPORT_OUTCOMES,
        &HEARTBEATS_SENT,
        &SEND_FAILURES,
        &LINK_ESTABLISHED,
        &LINK_UP,
    ];
}

/// Labels identifying one client link.
///
/// ```rust
/// use mtlink_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("base", "serial");
/// assert_eq!(labels.to_labels().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Name of the client instance.
    pub link: String,
    /// Transport kind (serial, tcp, ...).
    pub transport: String,
}

impl MetricLabels {
    /// Creates labels for a link.
    pub fn new(link: impl Into<String>, transport: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            transport: transport.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("link", self.link.clone()),
            ("transport", self.transport.clone()),
        ]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Registers descriptions for every metric in [`metric_defs::ALL`].
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus recorder serving scrapes on `addr`, then registers
/// all metric descriptions.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
