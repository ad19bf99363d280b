//! Self-similarity removal and bounded best-k collections.

use std::cmp::Ordering;

use crate::{Error, shapelet::Comparator, shapelet::Shapelet};

/// Drop every shapelet that overlaps a better one on the same series and channel.
///
/// `shapelets` must be sorted best first, the order of the survivors is kept.
#[must_use]
pub fn remove_self_similar(shapelets: Vec<Shapelet>) -> Vec<Shapelet> {
    let mut removed = vec![false; shapelets.len()];
    for index in 0..shapelets.len() {
        if removed[index] {
            continue;
        }

        for other in index + 1..shapelets.len() {
            if !removed[other] && shapelets[index].is_self_similar(&shapelets[other]) {
                removed[other] = true;
            }
        }
    }

    shapelets
        .into_iter()
        .zip(removed)
        .filter_map(|(shapelet, removed)| (!removed).then_some(shapelet))
        .collect()
}

/// Merge two sorted lists into the best `k`, ties keep the entry of `current`.
#[must_use]
pub fn combine(
    k: usize,
    current: Vec<Shapelet>,
    new: Vec<Shapelet>,
    comparator: Comparator,
) -> Vec<Shapelet> {
    let mut merged = Vec::with_capacity(k.min(current.len() + new.len()));
    let mut current = current.into_iter().peekable();
    let mut new = new.into_iter().peekable();

    while merged.len() < k {
        let take_new = match (current.peek(), new.peek()) {
            (Some(existing), Some(candidate)) => {
                comparator.compare(candidate, existing) == Ordering::Less
            }
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => break,
        };

        let next = if take_new { new.next() } else { current.next() };
        merged.extend(next);
    }

    merged
}

/// Bounded collection of the best shapelets found so far.
#[derive(Debug, Clone)]
pub enum BestK {
    /// A single list over all classes.
    Global {
        /// Maximum amount of shapelets.
        k: usize,
        /// Best shapelets, sorted best first.
        shapelets: Vec<Shapelet>,
    },
    /// A list per class id.
    PerClass {
        /// Maximum amount of shapelets per class.
        proportion: usize,
        /// Best shapelets per class id, sorted best first.
        lists: Vec<Vec<Shapelet>>,
    },
}

impl BestK {
    /// Single list of at most `k` shapelets.
    #[must_use]
    pub const fn global(k: usize) -> Self {
        Self::Global {
            k,
            shapelets: Vec::new(),
        }
    }

    /// A list of `k / num_classes` shapelets for every class.
    ///
    /// # Errors
    ///
    /// - When `k` is smaller than the amount of classes.
    pub fn per_class(k: usize, num_classes: usize) -> Result<Self, Error> {
        let proportion = k.checked_div(num_classes).unwrap_or_default();
        if proportion == 0 {
            return Err(Error::ClassProportionTooSmall {
                num_shapelets: k,
                num_classes,
            });
        }

        Ok(Self::PerClass {
            proportion,
            lists: vec![Vec::new(); num_classes],
        })
    }

    /// Merge sorted candidates of a single class into the collection.
    pub fn merge(&mut self, class_id: usize, candidates: Vec<Shapelet>, comparator: Comparator) {
        let (bound, list) = match self {
            Self::Global { k, shapelets } => (*k, shapelets),
            Self::PerClass { proportion, lists } => {
                let Some(list) = lists.get_mut(class_id) else {
                    branches::mark_unlikely();
                    return;
                };

                (*proportion, list)
            }
        };

        *list = combine(bound, std::mem::take(list), candidates, comparator);
    }

    /// Quality a candidate of `class_id` has to beat to enter a full list.
    ///
    /// `None` while the relevant list still has room.
    #[must_use]
    pub fn worst_quality(&self, class_id: usize) -> Option<f64> {
        let (bound, list) = match self {
            Self::Global { k, shapelets } => (*k, shapelets),
            Self::PerClass { proportion, lists } => (*proportion, lists.get(class_id)?),
        };

        if list.len() < bound {
            return None;
        }

        list.last().map(Shapelet::quality)
    }

    /// Every kept shapelet, in final set order.
    pub fn iter(&self) -> impl Iterator<Item = &Shapelet> {
        let lists: &[Vec<Shapelet>] = match self {
            Self::Global { shapelets, .. } => std::slice::from_ref(shapelets),
            Self::PerClass { lists, .. } => lists,
        };

        lists.iter().flatten()
    }

    /// Every kept shapelet, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Shapelet> {
        let lists: &mut [Vec<Shapelet>] = match self {
            Self::Global { shapelets, .. } => std::slice::from_mut(shapelets),
            Self::PerClass { lists, .. } => lists,
        };

        lists.iter_mut().flatten()
    }

    /// Amount of kept shapelets.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Global { shapelets, .. } => shapelets.len(),
            Self::PerClass { lists, .. } => lists.iter().map(Vec::len).sum(),
        }
    }

    /// Whether nothing has been kept yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Final set, per-class lists are concatenated in class id order.
    #[must_use]
    pub fn into_shapelets(self) -> Vec<Shapelet> {
        match self {
            Self::Global { shapelets, .. } => shapelets,
            Self::PerClass { lists, .. } => lists.into_iter().flatten().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::shapelet::tests::scored;

    use super::*;

    /// Overlapping worse shapelets disappear, disjoint ones stay.
    #[test]
    fn self_similarity() {
        let kept = remove_self_similar(vec![
            scored(0.9, 0, 2, 4),
            scored(0.8, 0, 4, 3),
            scored(0.7, 0, 6, 3),
            scored(0.6, 1, 2, 4),
            scored(0.5, 0, 0, 2),
        ]);

        let keys = kept
            .iter()
            .map(|shapelet| (shapelet.series_id(), shapelet.start()))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![(0, 2), (0, 6), (1, 2), (0, 0)]);
    }

    /// Merging keeps the best `k` in order.
    #[test]
    fn merge_is_bounded() {
        let comparator = Comparator::default();
        let merged = combine(
            3,
            vec![scored(0.9, 0, 0, 3), scored(0.5, 0, 1, 3)],
            vec![scored(0.7, 1, 0, 3), scored(0.6, 1, 1, 3), scored(0.1, 1, 2, 3)],
            comparator,
        );

        let qualities = merged.iter().map(Shapelet::quality).collect::<Vec<_>>();
        assert_eq!(qualities, vec![0.9, 0.7, 0.6]);
    }

    /// Equal shapelets keep the existing entry first.
    #[test]
    fn ties_prefer_existing() {
        let existing = scored(0.5, 0, 0, 3);
        let new = Shapelet::candidate(
            crate::search::Window {
                length: 3,
                start: 0,
                dimension: 0,
            },
            crate::quality::QualityScore {
                quality: 0.5,
                separation_gap: 0.0,
            },
            1,
            0,
            7.0,
        );

        let merged = combine(1, vec![existing], vec![new], Comparator::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].class_value(), 0.0);
    }

    /// Balanced collections keep a list per class.
    #[test]
    fn per_class() {
        let comparator = Comparator::default();
        let mut best = BestK::per_class(4, 2).expect("Valid proportion");
        assert_eq!(best.worst_quality(0), None);

        best.merge(1, vec![scored(0.9, 1, 0, 3), scored(0.8, 1, 4, 3), scored(0.7, 1, 8, 3)], comparator);
        best.merge(0, vec![scored(0.4, 0, 0, 3)], comparator);

        assert_eq!(best.len(), 3);
        assert_eq!(best.worst_quality(1), Some(0.8));
        assert_eq!(best.worst_quality(0), None);

        let qualities = best
            .into_shapelets()
            .iter()
            .map(Shapelet::quality)
            .collect::<Vec<_>>();
        assert_eq!(qualities, vec![0.4, 0.9, 0.8]);

        assert!(matches!(
            BestK::per_class(1, 2),
            Err(Error::ClassProportionTooSmall { num_shapelets: 1, num_classes: 2 })
        ));
    }
}
