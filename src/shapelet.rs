//! Scored subsequences and their ordering.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::{
    ChannelMode, Error, normalize::z_normalize, quality::QualityScore, search::Window,
    series::SeriesStore,
};

/// Z-normalized values of a shapelet, one vector per channel.
pub type ShapeletContent = SmallVec<Vec<f64>, 4>;

/// A scored subsequence of a series in the corpus.
///
/// Content is only present once the shapelet is part of a best-k collection or
/// when it is loaded from a log.
#[derive(Debug, Clone, PartialEq)]
pub struct Shapelet {
    /// Class separation quality, higher is better.
    quality: f64,
    /// Mean distance right of the best split minus the mean left of it.
    separation_gap: f64,
    /// Series the subsequence was taken from.
    series_id: usize,
    /// Start position in the series.
    start: usize,
    /// Amount of values per channel.
    length: usize,
    /// Channel the subsequence was taken from, `0` when it spans all channels.
    dimension: usize,
    /// Amount of channels in the content.
    num_channels: usize,
    /// Label of the series it was taken from.
    class_value: f64,
    /// Normalized values.
    content: Option<ShapeletContent>,
}

impl Shapelet {
    /// Scored candidate without content.
    pub(crate) const fn candidate(
        window: Window,
        score: QualityScore,
        num_channels: usize,
        series_id: usize,
        class_value: f64,
    ) -> Self {
        Self {
            quality: score.quality,
            separation_gap: score.separation_gap,
            series_id,
            start: window.start,
            length: window.length,
            dimension: window.dimension,
            num_channels,
            class_value,
            content: None,
        }
    }

    /// Build a shapelet from raw content, normalizing every channel.
    ///
    /// # Errors
    ///
    /// - When there is no channel, a channel is empty or the channels differ in length.
    /// - When a value is not finite.
    pub fn from_content(
        quality: f64,
        series_id: usize,
        start: usize,
        dimension: usize,
        class_value: f64,
        content: impl IntoIterator<Item = Vec<f64>>,
    ) -> Result<Self, Error> {
        let content: ShapeletContent = content
            .into_iter()
            .map(|channel| z_normalize(&channel))
            .collect();

        let length = content.first().map(Vec::len).unwrap_or_default();
        if length == 0 || content.iter().any(|channel| channel.len() != length) {
            return Err(Error::EmptySeries);
        }
        for (channel, values) in content.iter().enumerate() {
            if let Some(index) = values.iter().position(|value| !value.is_finite()) {
                return Err(Error::NonFiniteValue {
                    series: series_id,
                    channel,
                    index,
                });
            }
        }

        Ok(Self {
            quality,
            separation_gap: 0.0,
            series_id,
            start,
            length,
            dimension,
            num_channels: content.len(),
            class_value,
            content: Some(content),
        })
    }

    /// Copy and normalize the values of the subsequence from the corpus.
    pub(crate) fn materialize(&mut self, store: &SeriesStore, mode: ChannelMode) {
        if self.content.is_some() {
            return;
        }

        let window = Window {
            length: self.length,
            start: self.start,
            dimension: self.dimension,
        };
        self.content = Some(window_content(store, self.series_id, window, mode));
    }

    /// Drop the normalized values.
    pub fn clear_content(&mut self) {
        self.content = None;
    }

    /// Normalized values per channel, if present.
    #[must_use]
    pub fn content(&self) -> Option<&[Vec<f64>]> {
        self.content.as_deref()
    }

    /// Class separation quality.
    #[must_use]
    pub const fn quality(&self) -> f64 {
        self.quality
    }

    /// Separation gap at the best split.
    #[must_use]
    pub const fn separation_gap(&self) -> f64 {
        self.separation_gap
    }

    /// Series the subsequence was taken from.
    #[must_use]
    pub const fn series_id(&self) -> usize {
        self.series_id
    }

    /// Start position in the series.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Amount of values per channel.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Channel the subsequence was taken from.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Amount of channels.
    #[must_use]
    pub const fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Label of the originating series.
    #[must_use]
    pub const fn class_value(&self) -> f64 {
        self.class_value
    }

    /// Whether two shapelets share a series and channel and their ranges overlap.
    #[must_use]
    pub const fn is_self_similar(&self, other: &Self) -> bool {
        self.series_id == other.series_id
            && self.dimension == other.dimension
            && self.start < other.start + other.length
            && other.start < self.start + self.length
    }
}

/// Normalized values of a window, a single channel or all of them.
pub(crate) fn window_content(
    store: &SeriesStore,
    series: usize,
    window: Window,
    mode: ChannelMode,
) -> ShapeletContent {
    let channels = match mode {
        ChannelMode::Independent => window.dimension..window.dimension + 1,
        ChannelMode::Dependent => 0..store.num_channels(),
    };

    channels
        .map(|channel| {
            let values = store
                .channel(series, channel)
                .slice(ndarray::s![window.start..window.start + window.length])
                .to_vec();

            z_normalize(&values)
        })
        .collect()
}

/// Primary ranking statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankBy {
    /// Quality first, separation gap breaks ties.
    #[default]
    Quality,
    /// Separation gap first, quality breaks ties.
    SeparationGap,
}

/// Which length wins between equally ranked shapelets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthPreference {
    /// Shorter shapelets first.
    #[default]
    Shorter,
    /// Longer shapelets first.
    Longer,
}

/// Total "best first" order of shapelets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Comparator {
    /// Primary statistic.
    pub rank_by: RankBy,
    /// Length tie-break.
    pub length_preference: LengthPreference,
}

impl Comparator {
    /// Compare two shapelets, [`Ordering::Less`] means `left` is better.
    #[must_use]
    pub fn compare(self, left: &Shapelet, right: &Shapelet) -> Ordering {
        let (primary, secondary) = match self.rank_by {
            RankBy::Quality => (
                right.quality.total_cmp(&left.quality),
                right.separation_gap.total_cmp(&left.separation_gap),
            ),
            RankBy::SeparationGap => (
                right.separation_gap.total_cmp(&left.separation_gap),
                right.quality.total_cmp(&left.quality),
            ),
        };
        let length = match self.length_preference {
            LengthPreference::Shorter => left.length.cmp(&right.length),
            LengthPreference::Longer => right.length.cmp(&left.length),
        };

        primary
            .then(length)
            .then(secondary)
            .then_with(|| left.series_id.cmp(&right.series_id))
            .then_with(|| left.start.cmp(&right.start))
            .then_with(|| left.dimension.cmp(&right.dimension))
    }

    /// Sort best first.
    pub fn sort(self, shapelets: &mut [Shapelet]) {
        shapelets.sort_by(|left, right| self.compare(left, right));
    }

    /// Whether `shapelets` is sorted best first.
    #[must_use]
    pub fn is_sorted(self, shapelets: &[Shapelet]) -> bool {
        shapelets.is_sorted_by(|left, right| self.compare(left, right) != Ordering::Greater)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Content-less shapelet for ordering tests.
    pub(crate) fn scored(quality: f64, series_id: usize, start: usize, length: usize) -> Shapelet {
        Shapelet::candidate(
            Window {
                length,
                start,
                dimension: 0,
            },
            QualityScore {
                quality,
                separation_gap: 0.0,
            },
            1,
            series_id,
            0.0,
        )
    }

    /// Quality decides first, then length, then position.
    #[test]
    fn ordering() {
        let comparator = Comparator::default();
        let mut shapelets = vec![
            scored(0.5, 0, 0, 4),
            scored(0.9, 1, 2, 5),
            scored(0.5, 0, 1, 3),
            scored(0.5, 0, 0, 3),
        ];
        comparator.sort(&mut shapelets);

        let keys = shapelets
            .iter()
            .map(|shapelet| (shapelet.start(), shapelet.length()))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![(2, 5), (0, 3), (1, 3), (0, 4)]);
        assert!(comparator.is_sorted(&shapelets), "Sorted list is not sorted");

        let longer = Comparator {
            length_preference: LengthPreference::Longer,
            ..Comparator::default()
        };
        longer.sort(&mut shapelets);
        assert_eq!(shapelets[1].length(), 4);
    }

    /// Overlap is only self-similar on the same series and channel.
    #[test]
    fn self_similarity() {
        let base = scored(0.5, 0, 2, 3);

        assert!(base.is_self_similar(&scored(0.1, 0, 4, 3)));
        assert!(!base.is_self_similar(&scored(0.1, 0, 5, 3)));
        assert!(!base.is_self_similar(&scored(0.1, 1, 2, 3)));
    }

    /// Loaded content is normalized and validated.
    #[test]
    fn from_content() {
        let shapelet = Shapelet::from_content(0.7, 3, 1, 0, 1.0, [vec![2.0, 4.0, 6.0]])
            .expect("Valid content");
        let content = shapelet.content().expect("Content present");

        assert_eq!(shapelet.length(), 3);
        assert_eq!(shapelet.num_channels(), 1);
        approx::assert_relative_eq!(content[0][0], -content[0][2], epsilon = 1e-12);

        assert!(Shapelet::from_content(0.7, 3, 1, 0, 1.0, [vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(Shapelet::from_content(0.7, 3, 1, 0, 1.0, Vec::<Vec<f64>>::new()).is_err());
    }
}
