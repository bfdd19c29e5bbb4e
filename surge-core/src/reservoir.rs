use rand::Rng;
use std::time::Duration;

/// Bounded latency sample with uniform retention (Algorithm R).
///
/// The first `capacity` samples are stored as they arrive. After that the `n`th
/// sample replaces a uniformly chosen slot with probability `capacity / n`, so
/// the retained set stays an unbiased sample of the whole stream no matter how
/// long the worker runs.
#[derive(Debug, Clone)]
pub struct LatencyReservoir {
    samples: Vec<Duration>,
    capacity: usize,
    seen: u64,
}

impl LatencyReservoir {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            seen: 0,
        }
    }

    pub fn record<R: Rng + ?Sized>(&mut self, sample: Duration, rng: &mut R) {
        self.seen += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
            return;
        }

        let idx = rng.gen_range(0..self.seen);
        if idx < self.capacity as u64 {
            self.samples[idx as usize] = sample;
        }
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Duration> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples offered so far, retained or not.
    pub fn seen(&self) -> u64 {
        self.seen
    }
}
