//! Class separation quality of an orderline.

use std::cmp::Ordering;

use smallvec::{SmallVec, smallvec};

/// Class counts, most problems have few classes.
pub(crate) type ClassCounts = SmallVec<usize, 8>;

/// Statistic that rates how well distances to a candidate separate the classes.
///
/// # Defaults
///
/// - [`QualityMeasure::InformationGain`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QualityMeasure {
    /// Maximum entropy reduction of a single split, in bits.
    #[default]
    InformationGain,
    /// One-way ANOVA F statistic of the distances grouped by class.
    FStat,
    /// Kruskal-Wallis H statistic with tie-averaged ranks.
    KruskalWallis,
    /// Chi-square statistic of the counts above and below the grand median.
    MoodsMedian,
}

/// Distance of one series to a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderlineEntry {
    /// Minimum window distance.
    pub distance: f64,
    /// Class of the series.
    pub class_id: usize,
}

impl OrderlineEntry {
    /// Ascending by distance, then by class.
    #[inline]
    pub(crate) fn by_distance(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.class_id.cmp(&other.class_id))
    }
}

/// Result of scoring an orderline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityScore {
    /// Value of the quality measure, `0.0` for degenerate orderlines.
    pub quality: f64,
    /// Mean distance right of the best information gain split minus the mean left of it.
    pub separation_gap: f64,
}

impl QualityMeasure {
    /// Score a complete orderline, sorting it by distance.
    #[must_use]
    pub fn score(self, orderline: &mut [OrderlineEntry], num_classes: usize) -> QualityScore {
        orderline.sort_unstable_by(OrderlineEntry::by_distance);

        let totals = class_counts(orderline, num_classes);
        let present = totals.iter().filter(|count| **count > 0).count();
        if present < 2 || orderline.len() < 2 {
            return QualityScore::default();
        }

        let split = best_split(orderline, &totals);
        let quality = match self {
            Self::InformationGain => split.map(|(gain, _)| gain).unwrap_or_default(),
            Self::FStat => f_stat(orderline, &totals, present),
            Self::KruskalWallis => kruskal_wallis(orderline, &totals),
            Self::MoodsMedian => moods_median(orderline, &totals),
        };

        QualityScore {
            quality: if quality.is_finite() { quality.max(0.0) } else { 0.0 },
            separation_gap: split
                .map(|(_, index)| separation_gap(orderline, index))
                .unwrap_or_default(),
        }
    }
}

/// Amount of entries per class.
pub(crate) fn class_counts(orderline: &[OrderlineEntry], num_classes: usize) -> ClassCounts {
    let mut counts: ClassCounts = smallvec![0; num_classes];
    for entry in orderline {
        counts[entry.class_id] += 1;
    }

    counts
}

/// Entropy in bits of a class distribution.
#[inline]
pub(crate) fn entropy(counts: impl Iterator<Item = usize>, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    -counts
        .filter(|count| *count > 0)
        .map(|count| {
            let probability = count as f64 / total;

            probability * probability.log2()
        })
        .sum::<f64>()
}

/// Information gain of splitting into `left` and the rest of `totals`.
#[inline]
pub(crate) fn information_gain(left: &[usize], totals: &[usize]) -> f64 {
    let total = totals.iter().sum::<usize>();
    let left_total = left.iter().sum::<usize>();
    let right_total = total - left_total;
    if total == 0 {
        return 0.0;
    }

    let parent = entropy(totals.iter().copied(), total);
    let left_entropy = entropy(left.iter().copied(), left_total);
    let right_entropy = entropy(
        totals.iter().zip(left).map(|(total, left)| total - left),
        right_total,
    );

    parent
        - (left_total as f64 / total as f64) * left_entropy
        - (right_total as f64 / total as f64) * right_entropy
}

/// Best information gain and the last index left of the split.
///
/// Splits only fall between distinct distances of a sorted orderline.
fn best_split(orderline: &[OrderlineEntry], totals: &[usize]) -> Option<(f64, usize)> {
    let mut left: ClassCounts = smallvec![0; totals.len()];
    let mut best: Option<(f64, usize)> = None;

    for (index, pair) in orderline.windows(2).enumerate() {
        let [current, next] = pair else {
            continue;
        };
        left[current.class_id] += 1;
        if current.distance.total_cmp(&next.distance) == Ordering::Equal {
            continue;
        }

        let gain = information_gain(&left, totals);
        if best.is_none_or(|(best_gain, _)| gain > best_gain) {
            best = Some((gain, index));
        }
    }

    best
}

/// Mean distance right of `index` minus the mean up to and including it.
fn separation_gap(orderline: &[OrderlineEntry], index: usize) -> f64 {
    let (left, right) = orderline.split_at(index + 1);

    mean(right.iter().map(|entry| entry.distance)) - mean(left.iter().map(|entry| entry.distance))
}

/// Arithmetic mean, `0.0` when empty.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// One-way ANOVA F statistic.
fn f_stat(orderline: &[OrderlineEntry], totals: &[usize], present: usize) -> f64 {
    let num_entries = orderline.len();
    if num_entries <= present {
        return 0.0;
    }

    let mut sums: SmallVec<f64, 8> = smallvec![0.0; totals.len()];
    for entry in orderline {
        sums[entry.class_id] += entry.distance;
    }
    let grand_mean = mean(orderline.iter().map(|entry| entry.distance));
    let class_means = sums
        .iter()
        .zip(totals)
        .map(|(sum, count)| if *count == 0 { 0.0 } else { sum / *count as f64 })
        .collect::<SmallVec<f64, 8>>();

    let between = class_means
        .iter()
        .zip(totals)
        .map(|(class_mean, count)| *count as f64 * (class_mean - grand_mean).powi(2))
        .sum::<f64>();
    let within = orderline
        .iter()
        .map(|entry| (entry.distance - class_means[entry.class_id]).powi(2))
        .sum::<f64>();

    (between / (present - 1) as f64) / (within / (num_entries - present) as f64)
}

/// Kruskal-Wallis H statistic of a sorted orderline.
fn kruskal_wallis(orderline: &[OrderlineEntry], totals: &[usize]) -> f64 {
    let num_entries = orderline.len() as f64;
    let mut rank_sums: SmallVec<f64, 8> = smallvec![0.0; totals.len()];

    // Equal distances share the average of their ranks
    let mut start = 0;
    while start < orderline.len() {
        let mut end = start + 1;
        while end < orderline.len()
            && orderline[end].distance.total_cmp(&orderline[start].distance) == Ordering::Equal
        {
            end += 1;
        }

        let rank = (start + end + 1) as f64 / 2.0;
        for entry in &orderline[start..end] {
            rank_sums[entry.class_id] += rank;
        }
        start = end;
    }

    let sum = rank_sums
        .iter()
        .zip(totals)
        .filter(|(_, count)| **count > 0)
        .map(|(rank_sum, count)| rank_sum * rank_sum / *count as f64)
        .sum::<f64>();

    12.0 / (num_entries * (num_entries + 1.0)) * sum - 3.0 * (num_entries + 1.0)
}

/// Mood's median chi-square statistic of a sorted orderline.
fn moods_median(orderline: &[OrderlineEntry], totals: &[usize]) -> f64 {
    let half = orderline.len() / 2;
    let median = if orderline.len() % 2 == 0 {
        f64::midpoint(orderline[half - 1].distance, orderline[half].distance)
    } else {
        orderline[half].distance
    };

    let mut above: ClassCounts = smallvec![0; totals.len()];
    for entry in orderline.iter().filter(|entry| entry.distance > median) {
        above[entry.class_id] += 1;
    }
    let total_above = above.iter().sum::<usize>() as f64;
    let total_below = orderline.len() as f64 - total_above;
    let num_entries = orderline.len() as f64;

    above
        .iter()
        .zip(totals)
        .filter(|(_, count)| **count > 0)
        .map(|(above, count)| {
            let count = *count as f64;
            let above = *above as f64;
            let below = count - above;
            let expected_above = count * total_above / num_entries;
            let expected_below = count * total_below / num_entries;

            chi_term(above, expected_above) + chi_term(below, expected_below)
        })
        .sum()
}

/// Single chi-square term, empty expectations contribute nothing.
#[inline]
fn chi_term(observed: f64, expected: f64) -> f64 {
    if expected > 0.0 {
        (observed - expected).powi(2) / expected
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// Orderline from `(distance, class)` pairs.
    fn orderline(entries: &[(f64, usize)]) -> Vec<OrderlineEntry> {
        entries
            .iter()
            .map(|(distance, class_id)| OrderlineEntry {
                distance: *distance,
                class_id: *class_id,
            })
            .collect()
    }

    /// A perfect two class split has a gain of one bit.
    #[test]
    fn perfect_split() {
        let mut entries = orderline(&[(0.9, 1), (0.1, 0), (0.8, 1), (0.2, 0)]);
        let score = QualityMeasure::InformationGain.score(&mut entries, 2);

        assert_relative_eq!(score.quality, 1.0, epsilon = 1e-12);
        assert_relative_eq!(score.separation_gap, 0.85 - 0.15, epsilon = 1e-12);
        assert!(entries.is_sorted_by(|left, right| left.distance <= right.distance));
    }

    /// Equal distances cannot be separated.
    #[test]
    fn ties_are_not_split() {
        let mut entries = orderline(&[(0.5, 0), (0.5, 1), (0.5, 0), (0.5, 1)]);
        let score = QualityMeasure::InformationGain.score(&mut entries, 2);

        assert_eq!(score, QualityScore::default());
    }

    /// Degenerate orderlines score the minimum.
    #[test]
    fn degenerate() {
        for measure in [
            QualityMeasure::InformationGain,
            QualityMeasure::FStat,
            QualityMeasure::KruskalWallis,
            QualityMeasure::MoodsMedian,
        ] {
            assert_eq!(measure.score(&mut orderline(&[(0.1, 0), (0.4, 0)]), 2).quality, 0.0);
            assert_eq!(measure.score(&mut orderline(&[(0.1, 1)]), 2).quality, 0.0);
            assert_eq!(measure.score(&mut [], 2).quality, 0.0);
        }
    }

    /// Alternative measures against hand computed values.
    #[test]
    fn alternative_measures() {
        let entries = orderline(&[(1.0, 0), (2.0, 0), (3.0, 0), (4.0, 1), (5.0, 1), (6.0, 1)]);

        // Means 2 and 5, grand mean 3.5: between 13.5, within 4
        assert_relative_eq!(
            QualityMeasure::FStat.score(&mut entries.clone(), 2).quality,
            13.5 / (4.0 / 4.0),
            epsilon = 1e-12
        );
        // Rank sums 6 and 15
        assert_relative_eq!(
            QualityMeasure::KruskalWallis.score(&mut entries.clone(), 2).quality,
            12.0 / 42.0 * (36.0 / 3.0 + 225.0 / 3.0) - 21.0,
            epsilon = 1e-12
        );
        // Median 3.5, every class wholly on one side
        assert_relative_eq!(
            QualityMeasure::MoodsMedian.score(&mut entries.clone(), 2).quality,
            6.0,
            epsilon = 1e-12
        );
    }

    /// Gain with multiple classes stays within the parent entropy.
    #[test]
    fn gain_is_bounded_by_entropy() {
        let mut entries = orderline(&[(0.1, 0), (0.2, 1), (0.3, 2), (0.4, 0), (0.5, 2), (0.6, 1)]);
        let score = QualityMeasure::InformationGain.score(&mut entries, 3);

        assert!(score.quality > 0.0);
        assert!(score.quality <= 3.0_f64.log2());
    }
}
