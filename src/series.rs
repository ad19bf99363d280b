//! Immutable labeled time series corpus.

use ahash::AHashMap;
use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView3, AsArray, Axis, Ix2, Ix3, s};

use crate::Error;

/// Labeled corpus of equal length series, `series x channels x length`.
///
/// Labels are mapped onto dense class ids, sorted ascending by label value.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    /// All values, standard layout.
    values: Array3<f64>,
    /// Label per series.
    labels: Vec<f64>,
    /// Distinct labels, sorted ascending.
    classes: Vec<f64>,
    /// Class id per series.
    class_ids: Vec<usize>,
    /// Amount of series per class id.
    class_counts: Vec<usize>,
}

impl SeriesStore {
    /// Construct from a `series x length` array with a single channel.
    ///
    /// # Errors
    ///
    /// - When the data is empty, a value or a label is not finite, or the
    ///   amount of labels differs from the amount of series.
    pub fn univariate<'a>(values: impl AsArray<'a, f64, Ix2>, labels: &[f64]) -> Result<Self, Error> {
        let values: ArrayView2<f64> = values.into();

        Self::multivariate(values.insert_axis(Axis(1)), labels)
    }

    /// Construct from a `series x channels x length` array.
    ///
    /// # Errors
    ///
    /// - When the data is empty, a value or a label is not finite, or the
    ///   amount of labels differs from the amount of series.
    pub fn multivariate<'a>(
        values: impl AsArray<'a, f64, Ix3>,
        labels: &[f64],
    ) -> Result<Self, Error> {
        let values: ArrayView3<f64> = values.into();
        let (num_series, num_channels, length) = values.dim();

        if num_series == 0 {
            return Err(Error::EmptyDataset);
        }
        if num_channels == 0 || length == 0 {
            return Err(Error::EmptySeries);
        }
        if labels.len() != num_series {
            return Err(Error::LabelCountMismatch {
                series: num_series,
                labels: labels.len(),
            });
        }

        // Missing values are the loader's problem, reject them here
        for ((series, channel, index), value) in values.indexed_iter() {
            if branches::unlikely(!value.is_finite()) {
                return Err(Error::NonFiniteValue {
                    series,
                    channel,
                    index,
                });
            }
        }
        if let Some(position) = labels.iter().position(|label| !label.is_finite()) {
            return Err(Error::NonFiniteLabel(position));
        }

        // Distinct labels in ascending order
        let mut classes = labels.to_vec();
        classes.sort_unstable_by(f64::total_cmp);
        classes.dedup_by(|left, right| label_key(*left) == label_key(*right));

        let lookup: AHashMap<u64, usize> = classes
            .iter()
            .enumerate()
            .map(|(class_id, label)| (label_key(*label), class_id))
            .collect();
        let mut class_counts = vec![0; classes.len()];
        let class_ids = labels
            .iter()
            .map(|label| {
                let class_id = lookup.get(&label_key(*label)).copied().unwrap_or_default();
                class_counts[class_id] += 1;

                class_id
            })
            .collect();

        Ok(Self {
            values: values.as_standard_layout().into_owned(),
            labels: labels.to_vec(),
            classes,
            class_ids,
            class_counts,
        })
    }

    /// Amount of series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    /// Whether the store holds no series, never true for a constructed store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Amount of channels per series.
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    /// Length of every series.
    #[must_use]
    pub fn series_length(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    /// All channels of a series, `channels x length`.
    #[must_use]
    pub fn series(&self, series: usize) -> ArrayView2<'_, f64> {
        self.values.slice(s![series, .., ..])
    }

    /// A single channel of a series.
    #[must_use]
    pub fn channel(&self, series: usize, channel: usize) -> ArrayView1<'_, f64> {
        self.values.slice(s![series, channel, ..])
    }

    /// Label of a series.
    #[must_use]
    pub fn label(&self, series: usize) -> f64 {
        self.labels[series]
    }

    /// Labels of all series, in store order.
    #[must_use]
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Class id of a series.
    #[must_use]
    pub fn class_id(&self, series: usize) -> usize {
        self.class_ids[series]
    }

    /// Distinct labels, indexed by class id.
    #[must_use]
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Amount of distinct classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Amount of series per class id.
    #[must_use]
    pub fn class_counts(&self) -> &[usize] {
        &self.class_counts
    }

    /// Size of the smallest class.
    #[must_use]
    pub fn smallest_class(&self) -> usize {
        self.class_counts.iter().copied().min().unwrap_or_default()
    }

    /// Visit order cycling through the classes.
    ///
    /// Takes the first series of every class in class order, then the second
    /// of every class and so on, skipping exhausted classes.
    #[must_use]
    pub fn round_robin_order(&self) -> Vec<usize> {
        let mut per_class = vec![Vec::new(); self.num_classes()];
        for (series, class_id) in self.class_ids.iter().enumerate() {
            per_class[*class_id].push(series);
        }

        let rounds = per_class.iter().map(Vec::len).max().unwrap_or_default();
        (0..rounds)
            .flat_map(|round| {
                per_class
                    .iter()
                    .filter_map(move |members| members.get(round).copied())
            })
            .collect()
    }

    /// Visit order following the store.
    #[must_use]
    pub fn input_order(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }
}

/// Hashable key of a label, both zeros map to the same class.
#[inline]
fn label_key(label: f64) -> u64 {
    if label == 0.0 { 0 } else { label.to_bits() }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Labels map onto sorted dense class ids.
    #[test]
    fn class_index() {
        let store = SeriesStore::univariate(
            &ndarray::array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]],
            &[5.0, -1.0, 5.0, 2.0],
        )
        .expect("Valid store");

        assert_eq!(store.classes(), &[-1.0, 2.0, 5.0]);
        assert_eq!(store.class_id(0), 2);
        assert_eq!(store.class_id(1), 0);
        assert_eq!(store.class_counts(), &[1, 1, 2]);
        assert_eq!(store.smallest_class(), 1);
        assert_eq!(store.num_channels(), 1);
        assert_eq!(store.series_length(), 2);
    }

    /// Round robin interleaves the classes.
    #[test]
    fn round_robin() {
        let store = SeriesStore::univariate(
            &ndarray::Array2::<f64>::zeros((6, 3)),
            &[0.0, 0.0, 0.0, 1.0, 1.0, 2.0],
        )
        .expect("Valid store");

        assert_eq!(store.round_robin_order(), vec![0, 3, 5, 1, 4, 2]);
        assert_eq!(store.input_order(), vec![0, 1, 2, 3, 4, 5]);
    }

    /// Invalid data is rejected before discovery.
    #[test]
    fn rejects_invalid_data() {
        assert!(matches!(
            SeriesStore::univariate(&ndarray::array![[1.0, f64::NAN]], &[0.0]),
            Err(Error::NonFiniteValue { series: 0, channel: 0, index: 1 })
        ));
        assert!(matches!(
            SeriesStore::univariate(&ndarray::array![[1.0, 2.0]], &[0.0, 1.0]),
            Err(Error::LabelCountMismatch { series: 1, labels: 2 })
        ));
        assert!(matches!(
            SeriesStore::univariate(&ndarray::Array2::<f64>::zeros((0, 4)), &[]),
            Err(Error::EmptyDataset)
        ));
        assert!(matches!(
            SeriesStore::univariate(&ndarray::array![[1.0, 2.0]], &[f64::INFINITY]),
            Err(Error::NonFiniteLabel(0))
        ));
    }
}
