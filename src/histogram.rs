// SCHEDLAT HISTOGRAM BUFFER
// RAW LATENCY SAMPLES FOR ONE INTERVAL. SIZED ONCE AFTER CALIBRATION.
// PRE-ALLOCATED: NO HEAP ALLOCATION WHILE SAMPLING.
// WRAPS AT CAPACITY -- THE WINDOW RESTARTS FROM THE WRAP POINT AND
// THE OVERFLOW COUNTER GOES UP. NEVER GROWS.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistogramError {
    #[error("histogram capacity is zero (no samples observed during calibration)")]
    ZeroCapacity,

    #[error("cannot allocate histogram of {capacity} samples")]
    Alloc { capacity: usize },
}

pub struct Histogram {
    samples: Box<[i64]>,
    cursor: usize,
    overflows: u32,
}

impl Histogram {
    pub fn with_capacity(capacity: usize) -> Result<Self, HistogramError> {
        if capacity == 0 {
            return Err(HistogramError::ZeroCapacity);
        }
        let mut buf: Vec<i64> = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| HistogramError::Alloc { capacity })?;
        buf.resize(capacity, 0);
        Ok(Self {
            samples: buf.into_boxed_slice(),
            cursor: 0,
            overflows: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    // WRITE CURSOR, ALWAYS IN [0, capacity). ALSO THE LIVE SAMPLE COUNT:
    // A WRAP RESETS BOTH TO ZERO.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    // RECORD ONE SAMPLE. CALLED ONCE PER LOOP ITERATION -- KEEP IT BRANCH-LIGHT.
    #[inline]
    pub fn push(&mut self, diff: i64) {
        self.samples[self.cursor] = diff;
        self.cursor += 1;
        if self.cursor == self.samples.len() {
            self.cursor = 0;
            self.overflows += 1;
        }
    }

    // SAMPLES WRITTEN SINCE THE LAST RESET OR WRAP, IN INSERTION ORDER
    pub fn window(&self) -> &[i64] {
        &self.samples[..self.cursor]
    }

    // MUTABLE VIEW FOR THE MEDIAN SELECTION. REORDERS THE WINDOW.
    pub fn window_mut(&mut self) -> &mut [i64] {
        &mut self.samples[..self.cursor]
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.overflows = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_records_in_order() {
        let mut h = Histogram::with_capacity(4).unwrap();
        assert!(h.is_empty());
        h.push(10);
        h.push(-3);
        h.push(7);
        assert_eq!(h.window(), &[10, -3, 7]);
        assert_eq!(h.len(), 3);
        assert_eq!(h.overflows(), 0);
    }

    #[test]
    fn wrap_restarts_window() {
        let mut h = Histogram::with_capacity(3).unwrap();
        for v in [1, 2, 3] {
            h.push(v);
        }
        // EXACTLY FULL -> WRAPPED, EMPTY WINDOW
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.overflows(), 1);
        assert!(h.window().is_empty());

        h.push(40);
        h.push(50);
        assert_eq!(h.window(), &[40, 50]);
        assert_eq!(h.overflows(), 1);
    }

    #[test]
    fn cursor_stays_below_capacity() {
        let mut h = Histogram::with_capacity(5).unwrap();
        for i in 0..1000 {
            h.push(i);
            assert!(h.cursor() < h.capacity());
        }
        assert_eq!(h.overflows(), 200);
    }

    #[test]
    fn reset_clears_cursor_and_overflows() {
        let mut h = Histogram::with_capacity(2).unwrap();
        for v in [1, 2, 3] {
            h.push(v);
        }
        h.reset();
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.overflows(), 0);
        assert_eq!(h.capacity(), 2);
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            Histogram::with_capacity(0),
            Err(HistogramError::ZeroCapacity)
        ));
    }
}
