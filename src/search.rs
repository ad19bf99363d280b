//! Candidate window enumeration.

use rand::{SeedableRng as _, seq::index};
use rand_chacha::ChaCha8Rng;

use crate::Error;

/// Candidate subsequence of a single series.
///
/// The derived order is the canonical enumeration order: length, then start,
/// then dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Window {
    /// Amount of values.
    pub length: usize,
    /// Start position.
    pub start: usize,
    /// Channel, always `0` when the candidate spans all channels.
    pub dimension: usize,
}

/// How candidate windows are picked from every series.
///
/// # Defaults
///
/// - [`SearchKind::Full`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchKind {
    /// Every window, honouring the configured steps.
    #[default]
    Full,
    /// A uniform sample of distinct windows per series.
    Random {
        /// Windows to draw from every series.
        per_series: usize,
    },
    /// Every window with larger steps, replacing the configured steps.
    Skipping {
        /// Stride between start positions.
        position_step: usize,
        /// Stride between lengths.
        length_step: usize,
    },
}

/// Bounds of the enumerated windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    /// Shortest window.
    pub min_length: usize,
    /// Longest window.
    pub max_length: usize,
    /// Stride between lengths.
    pub length_step: usize,
    /// Stride between start positions.
    pub position_step: usize,
}

impl WindowBounds {
    /// Check the bounds without knowing the series.
    ///
    /// # Errors
    ///
    /// - When the length range is empty or starts at zero.
    /// - When a step is zero.
    pub fn validate(self) -> Result<(), Error> {
        if self.min_length == 0 || self.max_length < self.min_length {
            return Err(Error::InvalidLengthRange {
                min: self.min_length,
                max: self.max_length,
            });
        }
        if self.length_step == 0 || self.position_step == 0 {
            return Err(Error::InvalidStep);
        }

        Ok(())
    }

    /// Lengths that are enumerated.
    pub fn lengths(self) -> impl Iterator<Item = usize> {
        (self.min_length..=self.max_length).step_by(self.length_step)
    }
}

/// Produces the windows to evaluate for every visited series.
#[derive(Debug, Clone)]
pub struct CandidateEnumerator {
    /// Strategy.
    kind: SearchKind,
    /// Every window of a series, in canonical order.
    windows: Vec<Window>,
    /// Sampler for [`SearchKind::Random`], advanced across series.
    rng: ChaCha8Rng,
}

impl CandidateEnumerator {
    /// Set up enumeration for series of `series_length` values.
    ///
    /// `dimensions` is the amount of channels a window can start on.
    ///
    /// # Errors
    ///
    /// - When the bounds or steps are invalid.
    /// - When the longest window doesn't fit in the series.
    /// - When random search samples nothing.
    pub fn new(
        bounds: WindowBounds,
        kind: SearchKind,
        series_length: usize,
        dimensions: usize,
        seed: u64,
    ) -> Result<Self, Error> {
        bounds.validate()?;
        if bounds.max_length >= series_length {
            return Err(Error::LengthExceedsSeries {
                max: bounds.max_length,
                series_length,
            });
        }

        // Skipping replaces the configured strides
        let bounds = match kind {
            SearchKind::Skipping {
                position_step,
                length_step,
            } => {
                let skipped = WindowBounds {
                    position_step,
                    length_step,
                    ..bounds
                };
                skipped.validate()?;

                skipped
            }
            SearchKind::Random { per_series: 0 } => return Err(Error::InvalidSampleSize),
            SearchKind::Full | SearchKind::Random { .. } => bounds,
        };

        let windows = bounds
            .lengths()
            .flat_map(|length| {
                (0..=series_length - length)
                    .step_by(bounds.position_step)
                    .flat_map(move |start| {
                        (0..dimensions).map(move |dimension| Window {
                            length,
                            start,
                            dimension,
                        })
                    })
            })
            .collect();

        Ok(Self {
            kind,
            windows,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Amount of windows in a single series.
    #[must_use]
    pub fn windows_per_series(&self) -> usize {
        self.windows.len()
    }

    /// Amount of windows evaluated for a single series.
    #[must_use]
    pub fn candidates_per_series(&self) -> usize {
        match self.kind {
            SearchKind::Random { per_series } => per_series.min(self.windows.len()),
            SearchKind::Full | SearchKind::Skipping { .. } => self.windows.len(),
        }
    }

    /// Windows to evaluate for the next visited series, in canonical order.
    pub fn next_series(&mut self) -> Vec<Window> {
        match self.kind {
            SearchKind::Random { per_series } if per_series < self.windows.len() => {
                let mut picked = index::sample(&mut self.rng, self.windows.len(), per_series)
                    .into_vec();
                picked.sort_unstable();

                picked.into_iter().map(|index| self.windows[index]).collect()
            }
            SearchKind::Full | SearchKind::Random { .. } | SearchKind::Skipping { .. } => {
                self.windows.clone()
            }
        }
    }
}
