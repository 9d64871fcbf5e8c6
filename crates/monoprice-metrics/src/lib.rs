//! Metric declarations for the amplifier transaction engine.
//!
//! Each metric the engine emits is a `const` [`Metric`] below, so names,
//! units and label keys are defined once. Emission goes through the
//! `metrics` facade (re-exported); installing a recorder is up to the
//! application.
//!
//! ```rust,ignore
//! use monoprice_metrics::{metric_defs, TransactionLabels};
//!
//! monoprice_metrics::describe_metrics();
//!
//! let labels = TransactionLabels::new("query", 11).with_outcome("ok");
//! metrics::counter!(metric_defs::TRANSACTIONS.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Counter, gauge or histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Name, kind, unit, help text and label keys of one metric.
///
/// ```rust
/// use monoprice_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const PROBES: Metric =
///     Metric::counter("monoprice.discovery.probes", Unit::Count, "Addresses probed");
/// assert_eq!(PROBES.kind, MetricKind::Counter);
/// assert!(PROBES.labels.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub unit: Unit,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl Metric {
    pub const fn counter(name: &'static str, unit: Unit, help: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            unit,
            help,
            labels: &[],
        }
    }

    pub const fn gauge(name: &'static str, unit: Unit, help: &'static str) -> Self {
        Self {
            kind: MetricKind::Gauge,
            ..Self::counter(name, unit, help)
        }
    }

    pub const fn histogram(name: &'static str, unit: Unit, help: &'static str) -> Self {
        Self {
            kind: MetricKind::Histogram,
            ..Self::counter(name, unit, help)
        }
    }

    /// Label keys every sample of this metric carries.
    pub const fn labelled(self, labels: &'static [&'static str]) -> Self {
        Self { labels, ..self }
    }

    /// Register unit and help text with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.help),
            MetricKind::Gauge => describe_gauge!(self.name, self.unit, self.help),
            MetricKind::Histogram => describe_histogram!(self.name, self.unit, self.help),
        }
    }
}

/// Every metric the engine and discovery emit.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Keys identifying a transaction.
    pub const TRANSACTION_LABELS: &[&str] = &["direction", "zone"];

    // ========================================================================
    // Transaction engine
    // ========================================================================

    /// Finished transactions. `outcome` is `ok` or an error kind such as
    /// `invalid_zone` or `read_timeout`.
    pub const TRANSACTIONS: Metric = Metric::counter(
        "monoprice.engine.transactions",
        Unit::Count,
        "Finished serial transactions",
    )
    .labelled(&["direction", "zone", "outcome"]);

    /// Resends after an empty reply line.
    pub const RETRIES: Metric = Metric::counter(
        "monoprice.engine.retries",
        Unit::Count,
        "Commands resent after an empty reply",
    )
    .labelled(TRANSACTION_LABELS);

    pub const TIMEOUTS: Metric = Metric::counter(
        "monoprice.engine.timeouts",
        Unit::Count,
        "Transactions abandoned on timeout",
    )
    .labelled(TRANSACTION_LABELS);

    /// Lines thrown away because no current transaction owned them.
    pub const STALE_LINES: Metric = Metric::counter(
        "monoprice.engine.stale_lines",
        Unit::Count,
        "Late or unsolicited lines discarded",
    );

    /// First write to final reply line.
    pub const ROUND_TRIP: Metric = Metric::histogram(
        "monoprice.engine.round_trip_ms",
        Unit::Milliseconds,
        "Command round-trip time",
    )
    .labelled(TRANSACTION_LABELS);

    pub const QUEUE_DEPTH: Metric = Metric::gauge(
        "monoprice.engine.queue_depth",
        Unit::Count,
        "Requests waiting for the serializer",
    );

    // ========================================================================
    // Discovery
    // ========================================================================

    pub const ZONES_DISCOVERED: Metric = Metric::gauge(
        "monoprice.discovery.zones",
        Unit::Count,
        "Zones found by the last discovery run",
    );

    pub const ALL: &[&Metric] = &[
        &TRANSACTIONS,
        &RETRIES,
        &TIMEOUTS,
        &STALE_LINES,
        &ROUND_TRIP,
        &QUEUE_DEPTH,
        &ZONES_DISCOVERED,
    ];
}

/// Label values for one transaction.
#[derive(Debug, Clone)]
pub struct TransactionLabels {
    /// `query` or `set`.
    pub direction: &'static str,
    pub zone: u8,
    pub outcome: Option<&'static str>,
}

impl TransactionLabels {
    pub fn new(direction: &'static str, zone: u8) -> Self {
        Self {
            direction,
            zone,
            outcome: None,
        }
    }

    pub fn with_outcome(self, outcome: &'static str) -> Self {
        Self {
            outcome: Some(outcome),
            ..self
        }
    }

    /// Key/value pairs; the `metrics` macros accept a reference to them.
    ///
    /// ```rust
    /// use monoprice_metrics::TransactionLabels;
    ///
    /// let labels = TransactionLabels::new("set", 12).with_outcome("ok").to_labels();
    /// assert_eq!(labels[1], ("zone", "12".to_string()));
    /// assert_eq!(labels[2], ("outcome", "ok".to_string()));
    /// ```
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("direction", self.direction.to_string()),
            ("zone", self.zone.to_string()),
        ];
        pairs.extend(self.outcome.map(|o| ("outcome", o.to_string())));
        pairs
    }
}

/// Describe every metric to the installed recorder. Call once at startup.
pub fn describe_metrics() {
    metric_defs::ALL.iter().for_each(|m| m.describe());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_without_outcome() {
        let pairs = TransactionLabels::new("query", 11).to_labels();
        assert_eq!(
            pairs,
            vec![("direction", "query".to_string()), ("zone", "11".to_string())]
        );
    }

    #[test]
    fn test_labels_match_declared_keys() {
        let pairs = TransactionLabels::new("set", 21)
            .with_outcome("command_error")
            .to_labels();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, metric_defs::TRANSACTIONS.labels);

        let pairs = TransactionLabels::new("set", 21).to_labels();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, metric_defs::RETRIES.labels);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(metric_defs::TRANSACTIONS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::ROUND_TRIP.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::ROUND_TRIP.unit, Unit::Milliseconds);
        assert_eq!(metric_defs::QUEUE_DEPTH.kind, MetricKind::Gauge);
        assert!(metric_defs::STALE_LINES.labels.is_empty());
    }

    #[test]
    fn test_names_are_unique_and_namespaced() {
        let all = metric_defs::ALL;
        assert_eq!(all.len(), 7);
        for (i, a) in all.iter().enumerate() {
            assert!(a.name.starts_with("monoprice."));
            assert!(!a.help.is_empty());
            assert!(all[i + 1..].iter().all(|b| b.name != a.name));
        }
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
