// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! Metric construction and registration.
//!
//! Metric type construction is treated as an external collaborator by the
//! spec: this module is a thin adapter over the `prometheus` crate rather
//! than a from-scratch metrics implementation.
use std::collections::HashMap;

use prometheus::core::Collector;
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry};

use crate::error::EngineError;

fn arity_error(expected: usize, got: usize) -> MetricOpError {
    MetricOpError::LabelArity { expected, got }
}

/// Number of variable labels a `*Vec` collector was registered with.
///
/// `Collector::desc()` returns one `Desc` per metric family (always length
/// 1 here, never the label count) — the label names live on that single
/// `Desc`'s `variable_labels` field instead.
fn label_arity(desc: &[&prometheus::core::Desc]) -> usize {
    desc.first().map_or(0, |d| d.variable_labels.len())
}

/// The four metric kinds accepted in `metrics.<name>.type` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

/// Valid kind names, already sorted (spec §7: `UnknownMetricType` diagnostics
/// must list valid types in sorted order).
pub const VALID_KINDS: &[&str] = &["counter", "gauge", "histogram", "summary"];

impl MetricKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "histogram" => Some(MetricKind::Histogram),
            "summary" => Some(MetricKind::Summary),
            _ => None,
        }
    }
}

/// Parsed configuration for one metric, prior to registration.
#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub name: String,
    pub description: String,
    pub kind: MetricKind,
    pub labels: Vec<String>,
    pub buckets: Option<Vec<f64>>,
}

/// A registered metric, dispatched to the right `prometheus` type.
///
/// The `prometheus` crate has no native Summary type (unlike the Python
/// `prometheus_client` the reference system was built on); a `summary`
/// metric is realized as a [`Histogram`] with a single `+Inf` bucket, which
/// tracks sum and count correctly and costs nothing per-observation beyond
/// what a real summary would, at the expense of exposing `# TYPE ...
/// histogram` rather than `summary` in the exposition format. This is a
/// deliberate simplification, not an oversight — metric type construction
/// is explicitly out of scope for this engine (spec §1).
#[derive(Clone)]
pub enum MetricHandle {
    Counter(Counter),
    CounterVec(CounterVec),
    Gauge(Gauge),
    GaugeVec(GaugeVec),
    Histogram(Histogram),
    HistogramVec(HistogramVec),
    Summary(Histogram),
    SummaryVec(HistogramVec),
}

#[derive(Debug, thiserror::Error)]
pub enum MetricOpError {
    #[error("metric does not support {op}")]
    Unsupported { op: &'static str },
    #[error("expected {expected} label value(s), got {got}")]
    LabelArity { expected: usize, got: usize },
    #[error("counters cannot be incremented by a negative amount: {amount}")]
    NegativeIncrement { amount: f64 },
}

impl MetricHandle {
    pub fn inc(&self) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::Counter(c) => {
                c.inc();
                Ok(())
            }
            MetricHandle::Gauge(g) => {
                g.inc();
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "inc" }),
        }
    }

    pub fn inc_by(&self, amount: f64) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::Counter(c) => {
                if amount < 0.0 {
                    return Err(MetricOpError::NegativeIncrement { amount });
                }
                c.inc_by(amount);
                Ok(())
            }
            MetricHandle::Gauge(g) => {
                g.add(amount);
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "inc_by" }),
        }
    }

    pub fn set(&self, value: f64) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::Gauge(g) => {
                g.set(value);
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "set" }),
        }
    }

    pub fn observe(&self, value: f64) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::Histogram(h) | MetricHandle::Summary(h) => {
                h.observe(value);
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "observe" }),
        }
    }

    pub fn inc_labeled(&self, labels: &[&str]) -> Result<(), MetricOpError> {
        self.inc_by_labeled(1.0, labels)
    }

    pub fn inc_by_labeled(&self, amount: f64, labels: &[&str]) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::CounterVec(c) => {
                if amount < 0.0 {
                    return Err(MetricOpError::NegativeIncrement { amount });
                }
                c.get_metric_with_label_values(labels)
                    .map_err(|_| arity_error(label_arity(&c.desc()), labels.len()))?
                    .inc_by(amount);
                Ok(())
            }
            MetricHandle::GaugeVec(g) => {
                g.get_metric_with_label_values(labels)
                    .map_err(|_| arity_error(label_arity(&g.desc()), labels.len()))?
                    .add(amount);
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "inc_by_labeled" }),
        }
    }

    pub fn set_labeled(&self, value: f64, labels: &[&str]) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::GaugeVec(g) => {
                g.get_metric_with_label_values(labels)
                    .map_err(|_| arity_error(label_arity(&g.desc()), labels.len()))?
                    .set(value);
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "set_labeled" }),
        }
    }

    pub fn observe_labeled(&self, value: f64, labels: &[&str]) -> Result<(), MetricOpError> {
        match self {
            MetricHandle::HistogramVec(h) | MetricHandle::SummaryVec(h) => {
                h.get_metric_with_label_values(labels)
                    .map_err(|_| arity_error(label_arity(&h.desc()), labels.len()))?
                    .observe(value);
                Ok(())
            }
            _ => Err(MetricOpError::Unsupported { op: "observe_labeled" }),
        }
    }
}

/// Build and register every metric from `specs` into `registry`.
///
/// The returned map is frozen at this point: spec invariant "Metric
/// handles are created before any FileWatcher starts" is enforced by
/// callers simply never mutating the map after this returns.
pub fn create_metrics(
    specs: &[MetricSpec],
    registry: &Registry,
) -> Result<HashMap<String, MetricHandle>, EngineError> {
    let mut handles = HashMap::with_capacity(specs.len());
    for spec in specs {
        if handles.contains_key(&spec.name) {
            return Err(EngineError::DuplicateMetric(spec.name.clone()));
        }
        let handle = build_metric(spec, registry)?;
        handles.insert(spec.name.clone(), handle);
    }
    Ok(handles)
}

fn build_metric(spec: &MetricSpec, registry: &Registry) -> Result<MetricHandle, EngineError> {
    let label_refs: Vec<&str> = spec.labels.iter().map(String::as_str).collect();
    let handle = match (spec.kind, spec.labels.is_empty()) {
        (MetricKind::Counter, true) => {
            let c = Counter::with_opts(Opts::new(&spec.name, &spec.description))?;
            registry.register(Box::new(c.clone()))?;
            MetricHandle::Counter(c)
        }
        (MetricKind::Counter, false) => {
            let c = CounterVec::new(Opts::new(&spec.name, &spec.description), &label_refs)?;
            registry.register(Box::new(c.clone()))?;
            MetricHandle::CounterVec(c)
        }
        (MetricKind::Gauge, true) => {
            let g = Gauge::with_opts(Opts::new(&spec.name, &spec.description))?;
            registry.register(Box::new(g.clone()))?;
            MetricHandle::Gauge(g)
        }
        (MetricKind::Gauge, false) => {
            let g = GaugeVec::new(Opts::new(&spec.name, &spec.description), &label_refs)?;
            registry.register(Box::new(g.clone()))?;
            MetricHandle::GaugeVec(g)
        }
        (MetricKind::Histogram, true) => {
            let h = Histogram::with_opts(histogram_opts(spec))?;
            registry.register(Box::new(h.clone()))?;
            MetricHandle::Histogram(h)
        }
        (MetricKind::Histogram, false) => {
            let h = HistogramVec::new(histogram_opts(spec), &label_refs)?;
            registry.register(Box::new(h.clone()))?;
            MetricHandle::HistogramVec(h)
        }
        (MetricKind::Summary, true) => {
            let opts = HistogramOpts::new(&spec.name, &spec.description).buckets(vec![f64::INFINITY]);
            let h = Histogram::with_opts(opts)?;
            registry.register(Box::new(h.clone()))?;
            MetricHandle::Summary(h)
        }
        (MetricKind::Summary, false) => {
            let opts = HistogramOpts::new(&spec.name, &spec.description).buckets(vec![f64::INFINITY]);
            let h = HistogramVec::new(opts, &label_refs)?;
            registry.register(Box::new(h.clone()))?;
            MetricHandle::SummaryVec(h)
        }
    };
    Ok(handle)
}

fn histogram_opts(spec: &MetricSpec) -> HistogramOpts {
    let opts = HistogramOpts::new(&spec.name, &spec.description);
    match &spec.buckets {
        Some(buckets) => opts.buckets(buckets.clone()),
        None => opts.buckets(prometheus::DEFAULT_BUCKETS.to_vec()),
    }
}

#[cfg(test)]
#[path = "metric_tests.rs"]
mod tests;
