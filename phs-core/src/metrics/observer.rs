use std::sync::Arc;

use prometheus::{HistogramVec, IntCounterVec};
use tracing::warn;

use super::summary::SummaryVec;
use super::CLIENT_LABELS;

// The widest label set in use; anything wider falls back to the heap.
const MAX_LABELS: usize = CLIENT_LABELS.len();

/// A labeled instrument that accepts `f64` observations.
pub trait ObserverVec: Clone + Send + Sync + 'static {
    fn observe_with(&self, label_values: &[&str], value: f64);
}

impl ObserverVec for HistogramVec {
    fn observe_with(&self, label_values: &[&str], value: f64) {
        match self.get_metric_with_label_values(label_values) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!("Dropping histogram observation: {}", e),
        }
    }
}

impl ObserverVec for SummaryVec {
    fn observe_with(&self, label_values: &[&str], value: f64) {
        match self.get_metric_with_label_values(label_values) {
            Ok(summary) => summary.observe(value),
            Err(e) => warn!("Dropping summary observation: {}", e),
        }
    }
}

/// A labeled instrument with its trailing labels bound once.
///
/// Every instrument is labeled `code, method, ...`; the labels after `method`
/// (the handler name on the server, endpoint and action on the client) stay
/// the same for the lifetime of a wrapped handler.
#[derive(Clone)]
pub struct Curried<V> {
    vec: V,
    bound: Arc<[String]>,
}

impl<V> Curried<V> {
    pub fn new<I, S>(vec: V, bound: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vec,
            bound: bound.into_iter().map(Into::<String>::into).collect(),
        }
    }

    fn with_label_values<R>(&self, code: &str, method: &str, f: impl FnOnce(&[&str]) -> R) -> R {
        let len = 2 + self.bound.len();
        if len > MAX_LABELS {
            let mut values = vec![code, method];
            values.extend(self.bound.iter().map(String::as_str));
            return f(&values);
        }

        let mut values = [""; MAX_LABELS];
        values[0] = code;
        values[1] = method;
        for (slot, value) in values[2..].iter_mut().zip(self.bound.iter()) {
            *slot = value.as_str();
        }
        f(&values[..len])
    }
}

impl<V: ObserverVec> Curried<V> {
    pub fn observe(&self, code: &str, method: &str, value: f64) {
        self.with_label_values(code, method, |values| self.vec.observe_with(values, value));
    }
}

impl Curried<IntCounterVec> {
    pub fn inc(&self, code: &str, method: &str) {
        self.with_label_values(code, method, |values| {
            match self.vec.get_metric_with_label_values(values) {
                Ok(counter) => counter.inc(),
                Err(e) => warn!("Dropping counter increment: {}", e),
            }
        });
    }
}
