//! Minimum z-normalized window distance.
//!
//! The distance of a single window is the sum of squared differences between
//! the normalized candidate and the normalized window, divided by the candidate
//! length. In dependent mode the per-channel values are added up. The distance
//! of a series is the minimum over all of its windows.

use ndarray::ArrayView1;

use crate::{
    normalize::{PrefixStats, WindowStats},
    series::SeriesStore,
};

/// How window statistics are obtained.
///
/// # Defaults
///
/// - [`DistanceKind::Direct`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceKind {
    /// Compensated two-pass statistics for every window.
    #[default]
    Direct,
    /// Running sums updated when the window shifts.
    Online,
    /// Prefix sums computed once, distance from the correlation.
    Cached,
}

/// How candidates relate to the channels of a series.
///
/// # Defaults
///
/// - [`ChannelMode::Independent`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelMode {
    /// A candidate is taken from, and compared against, a single channel.
    #[default]
    Independent,
    /// A candidate spans all channels and per-channel distances are summed.
    Dependent,
}

impl ChannelMode {
    /// Amount of channels a window can start on.
    #[must_use]
    pub const fn dimensions(self, num_channels: usize) -> usize {
        match self {
            Self::Independent => num_channels,
            Self::Dependent => 1,
        }
    }
}

/// Distance between normalized content and the series of a store.
#[derive(Debug)]
pub struct NormalizedDistance<'a> {
    /// Corpus to compare against.
    store: &'a SeriesStore,
    /// Window statistics strategy.
    kind: DistanceKind,
    /// `prefix[series][channel]`, only for [`DistanceKind::Cached`].
    prefix: Vec<Vec<PrefixStats>>,
}

impl<'a> NormalizedDistance<'a> {
    /// Prepare distances against `store`.
    #[must_use]
    pub fn new(store: &'a SeriesStore, kind: DistanceKind) -> Self {
        let prefix = match kind {
            DistanceKind::Cached => (0..store.len())
                .map(|series| {
                    (0..store.num_channels())
                        .map(|channel| PrefixStats::new(store.channel(series, channel)))
                        .collect()
                })
                .collect(),
            DistanceKind::Direct | DistanceKind::Online => Vec::new(),
        };

        Self {
            store,
            kind,
            prefix,
        }
    }

    /// Amount of series that can be compared against.
    #[must_use]
    pub fn num_series(&self) -> usize {
        self.store.len()
    }

    /// Minimum window distance between `content` and a series.
    ///
    /// `content` holds one channel compared against channel `dimension`, or
    /// one vector for every channel of the series.
    #[must_use]
    pub fn distance(&self, content: &[Vec<f64>], dimension: usize, series: usize) -> f64 {
        let length = content.first().map(Vec::len).unwrap_or_default();
        let series_length = self.store.series_length();
        if branches::unlikely(length == 0 || length > series_length) {
            return f64::INFINITY;
        }

        // A single channel starts at `dimension`, multiple channels at zero
        let first_channel = if content.len() == 1 { dimension } else { 0 };
        let channels = || {
            content
                .iter()
                .enumerate()
                .map(move |(offset, values)| (values, first_channel + offset))
        };

        match self.kind {
            DistanceKind::Direct => {
                let mut best = f64::INFINITY;
                for start in 0..=series_length - length {
                    let mut total = 0.0;
                    for (values, channel) in channels() {
                        let window = self.window(series, channel, start, length);
                        total = abandoning_sum(values, window, WindowStats::of(window), total, best);
                    }
                    best = best.min(total);
                }

                best
            }
            DistanceKind::Online => self.online(series, channels().collect(), length),
            DistanceKind::Cached => {
                let mut best = f64::INFINITY;
                for start in 0..=series_length - length {
                    let total = channels()
                        .map(|(values, channel)| {
                            let window = self.window(series, channel, start, length);
                            let stats = self.prefix[series][channel]
                                .window(start, length)
                                .unwrap_or_else(|| WindowStats::of(window));

                            correlation_distance(values, window, stats)
                        })
                        .sum::<f64>();
                    best = best.min(total);
                }

                best
            }
        }
    }

    /// Online variant, the running sums follow the window along the series.
    fn online(&self, series: usize, channels: Vec<(&Vec<f64>, usize)>, length: usize) -> f64 {
        let mut running = channels
            .iter()
            .map(|(_, channel)| RunningWindow::new(self.store.channel(series, *channel), length))
            .collect::<Vec<_>>();

        let mut best = f64::INFINITY;
        for start in 0..=self.store.series_length() - length {
            let mut total = 0.0;
            for ((values, channel), window) in channels.iter().zip(&mut running) {
                if start > 0 {
                    window.shift(start);
                }

                let stats = window.stats(start);
                total = abandoning_sum(
                    values,
                    self.window(series, *channel, start, length),
                    stats,
                    total,
                    best,
                );
            }
            best = best.min(total);
        }

        best
    }

    /// Values of a window.
    #[inline]
    fn window(&self, series: usize, channel: usize, start: usize, length: usize) -> ArrayView1<'a, f64> {
        self.store
            .channel(series, channel)
            .slice_move(ndarray::s![start..start + length])
    }
}

/// Sums of a window moving along a channel, shifted by the channel mean.
struct RunningWindow<'a> {
    /// Channel the window moves along.
    channel: ArrayView1<'a, f64>,
    /// Window length.
    length: usize,
    /// Mean of the whole channel.
    offset: f64,
    /// Shifted sum of the window.
    sum: f64,
    /// Shifted sum of squares of the window.
    squares: f64,
    /// Squares added since the sums were last exact.
    magnitude: f64,
}

impl<'a> RunningWindow<'a> {
    /// Window at the start of the channel.
    fn new(channel: ArrayView1<'a, f64>, length: usize) -> Self {
        let mut window = Self {
            channel,
            length,
            offset: WindowStats::of(channel).mean,
            sum: 0.0,
            squares: 0.0,
            magnitude: 0.0,
        };
        window.recompute(0);

        window
    }

    /// Exact sums of the window at `start`.
    fn recompute(&mut self, start: usize) {
        let (sum, squares) = self
            .channel
            .slice(ndarray::s![start..start + self.length])
            .iter()
            .fold((0.0, 0.0), |(sum, squares), value| {
                let shifted = *value - self.offset;

                (sum + shifted, squares + shifted * shifted)
            });

        self.sum = sum;
        self.squares = squares;
        self.magnitude = squares;
    }

    /// Move the window from `start - 1` to `start`.
    #[inline]
    fn shift(&mut self, start: usize) {
        let leaving = self.channel[start - 1] - self.offset;
        let entering = self.channel[start + self.length - 1] - self.offset;

        self.sum += entering - leaving;
        self.squares += entering * entering - leaving * leaving;
        self.magnitude += entering * entering;
    }

    /// Statistics of the window at `start`, exact again when the sums lost precision.
    #[inline]
    fn stats(&mut self, start: usize) -> WindowStats {
        if let Some(stats) = WindowStats::from_shifted_sums(
            self.sum,
            self.squares,
            self.length,
            self.offset,
            self.magnitude,
        ) {
            return stats;
        }

        self.recompute(start);
        WindowStats::of(self.channel.slice(ndarray::s![start..start + self.length]))
    }
}

/// Add the normalized window distance to `total`, stop once it passes `best`.
#[inline]
fn abandoning_sum(
    content: &[f64],
    window: ArrayView1<f64>,
    stats: WindowStats,
    mut total: f64,
    best: f64,
) -> f64 {
    let length = content.len() as f64;
    for (expected, value) in content.iter().zip(window) {
        total += (expected - stats.normalize(*value)).powi(2) / length;

        if total >= best {
            break;
        }
    }

    total
}

/// Normalized window distance through the correlation, `2 (1 - r)`.
///
/// Flat windows and flat content follow the same policy as the direct
/// computation: both flat is `0`, one of them flat is `1`.
#[inline]
fn correlation_distance(content: &[f64], window: ArrayView1<f64>, stats: WindowStats) -> f64 {
    let content_flat = content.iter().all(|value| *value == 0.0);

    match (content_flat, stats.is_flat()) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        (false, false) => {
            // Normalized content has zero mean, centring the window only removes rounding
            let dot = content
                .iter()
                .zip(window)
                .map(|(expected, value)| expected * (value - stats.mean))
                .sum::<f64>();
            let correlation = dot / (content.len() as f64 * stats.std);

            (2.0 * (1.0 - correlation)).max(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::normalize::z_normalize;

    use super::*;

    /// Store with a few shapes.
    fn store() -> SeriesStore {
        SeriesStore::multivariate(
            &ndarray::array![
                [
                    [0.0, 1.0, 5.0, 2.0, 8.0, 3.0, 3.0, 3.0],
                    [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]
                ],
                [
                    [4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0],
                    [2.0, 7.0, 1.0, 8.0, 2.0, 8.0, 1.0, 8.0]
                ]
            ],
            &[0.0, 1.0],
        )
        .expect("Valid store")
    }

    /// A window taken from the series itself has distance zero.
    #[test]
    fn exact_match_is_zero() {
        let store = store();
        let content = vec![z_normalize(&[1.0, 5.0, 2.0])];

        for kind in [DistanceKind::Direct, DistanceKind::Online, DistanceKind::Cached] {
            let distance = NormalizedDistance::new(&store, kind).distance(&content, 0, 0);
            assert_relative_eq!(distance, 0.0, epsilon = 1e-9);
        }
    }

    /// All variants agree, flat windows included.
    #[test]
    fn variants_agree() {
        let store = store();
        let contents = [
            vec![z_normalize(&[3.0, 1.0, 2.0, 0.5])],
            vec![z_normalize(&[1.0, 1.0, 1.0])],
            vec![z_normalize(&[0.0, 1.0, 0.0]), z_normalize(&[2.0, 2.0, 9.0])],
        ];

        for content in &contents {
            for series in 0..store.len() {
                for dimension in 0..2 {
                    let direct = NormalizedDistance::new(&store, DistanceKind::Direct)
                        .distance(content, dimension, series);
                    let online = NormalizedDistance::new(&store, DistanceKind::Online)
                        .distance(content, dimension, series);
                    let cached = NormalizedDistance::new(&store, DistanceKind::Cached)
                        .distance(content, dimension, series);

                    assert!(direct.is_finite() && direct >= 0.0, "Invalid distance {direct}");
                    assert_relative_eq!(direct, online, epsilon = 1e-9);
                    assert_relative_eq!(direct, cached, epsilon = 1e-9);
                }
            }
        }
    }

    /// A large baseline gives the same distances in every variant.
    #[test]
    fn variants_agree_with_baseline() {
        let values = ndarray::Array2::from_shape_fn((3, 30), |(series, index)| {
            1e8 + 10.0 * (0.7 * index as f64 + series as f64).sin()
        });
        let store = SeriesStore::univariate(&values, &[0.0, 1.0, 1.0]).expect("Valid store");
        let content = vec![z_normalize(
            values
                .row(0)
                .slice(ndarray::s![5..13])
                .as_slice()
                .expect("Contiguous row"),
        )];

        let direct = NormalizedDistance::new(&store, DistanceKind::Direct);
        let online = NormalizedDistance::new(&store, DistanceKind::Online);
        let cached = NormalizedDistance::new(&store, DistanceKind::Cached);
        for series in 0..store.len() {
            let expected = direct.distance(&content, 0, series);

            assert_relative_eq!(online.distance(&content, 0, series), expected, epsilon = 1e-6);
            assert_relative_eq!(cached.distance(&content, 0, series), expected, epsilon = 1e-6);
        }
        assert_relative_eq!(cached.distance(&content, 0, 0), 0.0, epsilon = 1e-6);
        assert!(cached.distance(&content, 0, 1) > 1e-3);
    }

    /// Flat policy: one flat side is one, both flat is zero.
    #[test]
    fn flat_windows() {
        let store = store();
        let distance = NormalizedDistance::new(&store, DistanceKind::Direct);

        // Series 1 channel 0 is constant
        assert_relative_eq!(
            distance.distance(&[z_normalize(&[1.0, 2.0, 4.0])], 0, 1),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(distance.distance(&[vec![0.0; 3]], 0, 1), 0.0);
    }
}
