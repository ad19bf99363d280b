//! Z-normalization.
//!
//! Every window that is compared during discovery or transform goes through the
//! same zero-variance policy: a window is flat when its standard deviation is at
//! most [`FLAT_TOLERANCE`] relative to `1 + |mean|`, and a flat window normalizes
//! to all zeros.

use accurate::{sum::Kahan, traits::SumAccumulator as _};
use ndarray::ArrayView1;

/// Relative standard deviation under which a window counts as flat.
pub const FLAT_TOLERANCE: f64 = 1e-8;

/// Fraction of the accumulated sum of squares a single pass variance must exceed.
pub const CANCELLATION_LIMIT: f64 = 1e-6;

/// Mean and population standard deviation of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Mean of the window.
    pub mean: f64,
    /// Population standard deviation of the window.
    pub std: f64,
}

impl WindowStats {
    /// Two-pass compensated statistics.
    #[inline]
    #[must_use]
    pub fn of<'a>(values: impl IntoIterator<Item = &'a f64> + Clone) -> Self {
        let mut sum = Kahan::zero();
        let mut count = 0_usize;
        for value in values.clone() {
            sum += *value;
            count += 1;
        }
        if count == 0 {
            return Self { mean: 0.0, std: 0.0 };
        }
        let len = count as f64;
        let mean = sum.sum() / len;

        let mut squares = Kahan::zero();
        for value in values {
            squares += (*value - mean).powi(2);
        }

        Self {
            mean,
            std: (squares.sum() / len).max(0.0).sqrt(),
        }
    }

    /// Statistics from the sums of a window whose values were shifted by `offset`.
    ///
    /// `magnitude` is the largest sum of squares the accumulators went through.
    /// `None` when cancellation leaves too few digits of the variance, the
    /// caller then recomputes the window with [`WindowStats::of`].
    #[inline]
    #[must_use]
    pub fn from_shifted_sums(
        sum: f64,
        squares: f64,
        len: usize,
        offset: f64,
        magnitude: f64,
    ) -> Option<Self> {
        let count = len as f64;
        let mean = sum / count;
        let spread = squares - sum * mean;
        if spread <= CANCELLATION_LIMIT * magnitude {
            return None;
        }

        Some(Self {
            mean: mean + offset,
            std: (spread / count).sqrt(),
        })
    }

    /// Whether the window normalizes to zeros.
    #[inline]
    #[must_use]
    pub fn is_flat(self) -> bool {
        self.std <= FLAT_TOLERANCE * (1.0 + self.mean.abs())
    }

    /// Normalize a single value, flat windows map to zero.
    #[inline]
    #[must_use]
    pub fn normalize(self, value: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }
}

/// Z-normalize a window into a new vector.
#[must_use]
pub fn z_normalize(values: &[f64]) -> Vec<f64> {
    let stats = WindowStats::of(values);

    values.iter().map(|value| stats.normalize(*value)).collect()
}

/// Compensated prefix sums of a single channel, window statistics in O(1).
///
/// The values are shifted by the channel mean first so a large baseline
/// doesn't cancel the window variance.
#[derive(Debug, Clone)]
pub struct PrefixStats {
    /// Mean of the whole channel.
    offset: f64,
    /// `sums[i]` is the shifted sum of the first `i` values.
    sums: Vec<f64>,
    /// `squares[i]` is the shifted sum of squares of the first `i` values.
    squares: Vec<f64>,
}

impl PrefixStats {
    /// Accumulate the prefix sums of a channel.
    #[must_use]
    pub fn new(channel: ArrayView1<f64>) -> Self {
        let offset = WindowStats::of(channel).mean;
        let mut sums = Vec::with_capacity(channel.len() + 1);
        let mut squares = Vec::with_capacity(channel.len() + 1);
        sums.push(0.0);
        squares.push(0.0);

        let mut sum = Kahan::zero();
        let mut square = Kahan::zero();
        for value in channel {
            let shifted = *value - offset;
            sum += shifted;
            square += shifted * shifted;
            sums.push(sum.clone().sum());
            squares.push(square.clone().sum());
        }

        Self {
            offset,
            sums,
            squares,
        }
    }

    /// Statistics of the window `start..start + len`.
    ///
    /// `None` when the prefix sums can't resolve the variance of the window.
    #[inline]
    #[must_use]
    pub fn window(&self, start: usize, len: usize) -> Option<WindowStats> {
        let end = start + len;

        WindowStats::from_shifted_sums(
            self.sums[end] - self.sums[start],
            self.squares[end] - self.squares[start],
            len,
            self.offset,
            self.squares[end],
        )
    }
}
