//! Labeled summaries reporting percentiles over a sliding time window.
//!
//! The `prometheus` crate has no summary type, so `SummaryVec` implements
//! [`Collector`] itself and registers like any built-in vector.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use prometheus::Opts;

use super::quantile::QuantileStream;
use crate::config::PercentileConfig;

/// Default width of the sliding window.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Default number of streams the window is split into.
pub const DEFAULT_AGE_BUCKETS: u32 = 5;

/// Options for a [`SummaryVec`].
#[derive(Debug, Clone)]
pub struct SummaryOpts {
    pub common_opts: Opts,
    pub objectives: PercentileConfig,
    pub max_age: Duration,
    pub age_buckets: u32,
}

impl SummaryOpts {
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, help: S2) -> Self {
        Self {
            common_opts: Opts::new(name, help),
            objectives: PercentileConfig::default(),
            max_age: DEFAULT_MAX_AGE,
            age_buckets: DEFAULT_AGE_BUCKETS,
        }
    }

    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.common_opts.namespace = namespace.into();
        self
    }

    pub fn subsystem<S: Into<String>>(mut self, subsystem: S) -> Self {
        self.common_opts.subsystem = subsystem.into();
        self
    }

    pub fn objectives(mut self, objectives: PercentileConfig) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets.max(1);
        self
    }

    pub fn fq_name(&self) -> String {
        self.common_opts.fq_name()
    }
}

struct Window {
    streams: Vec<QuantileStream>,
    head: usize,
    head_expires: Instant,
    stream_duration: Duration,
    count: u64,
    sum: f64,
}

impl Window {
    fn new(opts: &SummaryOpts, now: Instant) -> Self {
        // `age_buckets` is public, so zero can get past the builder.
        let age_buckets = opts.age_buckets.max(1);
        let stream_duration = opts.max_age / age_buckets;
        let stream = QuantileStream::new(opts.objectives.objectives());
        Self {
            streams: vec![stream; age_buckets as usize],
            head: 0,
            head_expires: now + stream_duration,
            stream_duration,
            count: 0,
            sum: 0.0,
        }
    }

    // The head stream holds the longest history; when it expires it is
    // cleared and becomes the youngest.
    fn rotate(&mut self, now: Instant) {
        if self.stream_duration.is_zero() {
            return;
        }
        while now >= self.head_expires {
            self.streams[self.head].reset();
            self.head = (self.head + 1) % self.streams.len();
            self.head_expires += self.stream_duration;
        }
    }

    fn observe(&mut self, value: f64, now: Instant) {
        self.rotate(now);
        for stream in &mut self.streams {
            stream.insert(value);
        }
        self.count += 1;
        self.sum += value;
    }

    fn write(&mut self, opts: &SummaryOpts, now: Instant) -> proto::Summary {
        self.rotate(now);
        let mut summary = proto::Summary::default();
        summary.set_sample_count(self.count);
        summary.set_sample_sum(self.sum);
        let head = &mut self.streams[self.head];
        for objective in opts.objectives.iter() {
            let mut quantile = proto::Quantile::default();
            quantile.set_quantile(objective.quantile);
            quantile.set_value(head.query(objective.quantile));
            summary.mut_quantile().push(quantile);
        }
        summary
    }
}

/// A single labeled child of a [`SummaryVec`].
#[derive(Clone)]
pub struct Summary {
    window: Arc<Mutex<Window>>,
}

impl Summary {
    pub fn observe(&self, value: f64) {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.observe(value, Instant::now());
    }

    pub fn get_sample_count(&self) -> u64 {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    pub fn get_sample_sum(&self) -> f64 {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sum
    }
}

struct SummaryVecCore {
    desc: Desc,
    opts: SummaryOpts,
    children: RwLock<HashMap<Vec<String>, Summary>>,
}

/// Summaries partitioned by label values.
#[derive(Clone)]
pub struct SummaryVec {
    core: Arc<SummaryVecCore>,
}

impl SummaryVec {
    pub fn new(opts: SummaryOpts, label_names: &[&str]) -> prometheus::Result<Self> {
        let desc = Desc::new(
            opts.fq_name(),
            opts.common_opts.help.clone(),
            label_names.iter().map(|l| l.to_string()).collect(),
            HashMap::new(),
        )?;
        Ok(Self {
            core: Arc::new(SummaryVecCore {
                desc,
                opts,
                children: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// The child for these label values, created on first use.
    pub fn get_metric_with_label_values(&self, values: &[&str]) -> prometheus::Result<Summary> {
        let expected = self.core.desc.variable_labels.len();
        if values.len() != expected {
            return Err(prometheus::Error::InconsistentCardinality {
                expect: expected,
                got: values.len(),
            });
        }

        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        if let Some(child) = self
            .core
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(child.clone());
        }

        let mut children = self
            .core
            .children
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let child = children.entry(key).or_insert_with(|| Summary {
            window: Arc::new(Mutex::new(Window::new(&self.core.opts, Instant::now()))),
        });
        Ok(child.clone())
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let desc = &self.core.desc;
        let now = Instant::now();

        let mut family = MetricFamily::default();
        family.set_name(desc.fq_name.clone());
        family.set_help(desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);

        let children = self
            .core
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (values, child) in children.iter() {
            let mut pairs: Vec<LabelPair> = desc
                .variable_labels
                .iter()
                .zip(values)
                .map(|(name, value)| {
                    let mut pair = LabelPair::default();
                    pair.set_name(name.clone());
                    pair.set_value(value.clone());
                    pair
                })
                .collect();
            pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));

            let mut metric = proto::Metric::default();
            for pair in pairs {
                metric.mut_label().push(pair);
            }
            let summary = child
                .window
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write(&self.core.opts, now);
            metric.set_summary(summary);
            family.mut_metric().push(metric);
        }

        vec![family]
    }
}
