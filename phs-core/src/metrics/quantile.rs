//! Targeted quantile estimation over a stream of observations.
//!
//! Implements the biased-quantile algorithm of Cormode, Korn, Muthukrishnan
//! and Srivastava ("Effective Computation of Biased Quantiles over Data
//! Streams"), keeping only as many samples as the configured objectives need.

use crate::config::Objective;

const BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    width: f64,
    delta: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct QuantileStream {
    targets: Vec<Objective>,
    samples: Vec<Sample>,
    buffer: Vec<f64>,
    n: f64,
}

impl QuantileStream {
    pub(crate) fn new(targets: &[Objective]) -> Self {
        Self {
            targets: targets.to_vec(),
            samples: Vec::new(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            n: 0.0,
        }
    }

    pub(crate) fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        if self.buffer.len() == BUFFER_CAPACITY {
            self.flush();
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        self.buffer.len() + self.n as usize
    }

    pub(crate) fn reset(&mut self) {
        self.samples.clear();
        self.buffer.clear();
        self.n = 0.0;
    }

    /// Estimated value at quantile `q`, NaN when nothing was observed.
    pub(crate) fn query(&mut self, q: f64) -> f64 {
        if self.samples.is_empty() {
            // Not flushed yet: the buffer holds every observation exactly.
            if self.buffer.is_empty() {
                return f64::NAN;
            }
            self.buffer.sort_by(f64::total_cmp);
            let rank = (self.buffer.len() as f64 * q).ceil() as usize;
            let idx = rank.saturating_sub(1).min(self.buffer.len() - 1);
            return self.buffer[idx];
        }

        self.flush();

        let mut t = (q * self.n).ceil();
        t += (self.invariant(t) / 2.0).ceil();

        let mut prev = self.samples[0];
        let mut r = 0.0;
        for current in &self.samples[1..] {
            r += prev.width;
            if r + current.width + current.delta > t {
                return prev.value;
            }
            prev = *current;
        }
        prev.value
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut sorted = std::mem::take(&mut self.buffer);
        sorted.sort_by(f64::total_cmp);
        self.merge(&sorted);
        sorted.clear();
        self.buffer = sorted;
    }

    // Allowed rank error at rank `r`, the tightest over all targets.
    fn invariant(&self, r: f64) -> f64 {
        self.targets
            .iter()
            .map(|t| {
                if t.quantile * self.n <= r {
                    2.0 * t.error * r / t.quantile
                } else {
                    2.0 * t.error * (self.n - r) / (1.0 - t.quantile)
                }
            })
            .fold(f64::MAX, f64::min)
    }

    fn merge(&mut self, sorted: &[f64]) {
        let mut r = 0.0;
        let mut i = 0;
        for &value in sorted {
            let mut inserted = false;
            while i < self.samples.len() {
                let current = self.samples[i];
                if current.value > value {
                    let delta = (self.invariant(r).floor() - 1.0).max(0.0);
                    self.samples.insert(
                        i,
                        Sample {
                            value,
                            width: 1.0,
                            delta,
                        },
                    );
                    i += 1;
                    inserted = true;
                    break;
                }
                r += current.width;
                i += 1;
            }
            if !inserted {
                self.samples.push(Sample {
                    value,
                    width: 1.0,
                    delta: 0.0,
                });
                i += 1;
            }
            self.n += 1.0;
            r += 1.0;
        }
        self.compress();
    }

    fn compress(&mut self) {
        if self.samples.len() < 2 {
            return;
        }
        let last = self.samples.len() - 1;
        let mut x = self.samples[last];
        let mut xi = last;
        let mut r = self.n - 1.0 - x.width;

        for i in (0..last).rev() {
            let current = self.samples[i];
            if current.width + x.width + x.delta <= self.invariant(r) {
                x.width += current.width;
                self.samples[xi] = x;
                self.samples.remove(i);
                xi -= 1;
            } else {
                x = current;
                xi = i;
            }
            r -= current.width;
        }
    }
}
