// SCHEDLAT AGGREGATOR
// PURE FUNCTIONS OVER ONE INTERVAL'S SAMPLE WINDOW. NO I/O, NO CLOCK.

use crate::config::{MAX_LATENCY_SENTINEL_US, MIN_LATENCY_SENTINEL_US};

// REPORTED INSTEAD OF AN AVERAGE WHEN THE SUM DOES NOT FIT IN i64
pub const AVERAGE_OVERFLOW: i64 = -1;

// SUM IN INSERTION ORDER. BAIL WITH THE SENTINEL ON THE FIRST WRAP.
// FLOOR DIVISION. EMPTY WINDOW -> 0.
pub fn average(samples: &[i64]) -> i64 {
    if samples.is_empty() {
        return 0;
    }
    let mut sum: i64 = 0;
    for &s in samples {
        sum = match sum.checked_add(s) {
            Some(v) => v,
            None => return AVERAGE_OVERFLOW,
        };
    }
    sum.div_euclid(samples.len() as i64)
}

// ELEMENT AT count/2 OF THE ASCENDING ORDER (UPPER MIDDLE FOR EVEN COUNTS).
// PARTIALLY REORDERS samples. EMPTY WINDOW -> 0.
pub fn median(samples: &mut [i64]) -> i64 {
    if samples.is_empty() {
        return 0;
    }
    let mid = samples.len() / 2;
    let (_, m, _) = samples.select_nth_unstable(mid);
    *m
}

// RUNNING MIN/MAX FOR THE CURRENT INTERVAL
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Accumulator {
    pub max: i64,
    pub min: i64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            max: MAX_LATENCY_SENTINEL_US,
            min: MIN_LATENCY_SENTINEL_US,
        }
    }
}

impl Accumulator {
    #[inline]
    pub fn observe(&mut self, diff: i64) {
        if diff > self.max {
            self.max = diff;
        }
        if diff < self.min {
            self.min = diff;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
