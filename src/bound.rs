//! Anytime upper bound on the quality of a partially built orderline.
//!
//! Information gain is convex in the left class counts of a split, so over all
//! ways the unseen series can fall, its maximum is reached when every class's
//! unseen series go wholly left or wholly right. Enumerating those placements
//! for every split of the partial orderline gives an exact bound.
//!
//! Only classes that still have unseen series take part in the enumeration.
//! With more of those than [`MAX_EXACT_CLASSES`] the bound stays permissive.

use smallvec::smallvec;

use crate::quality::{ClassCounts, OrderlineEntry, QualityMeasure, information_gain};

/// Slack on the quality comparison, absorbs rounding in the bound.
pub const PRUNING_SLACK: f64 = 1e-12;

/// Above this amount of classes with unseen series the placements are not enumerated.
pub const MAX_EXACT_CLASSES: usize = 5;

/// Per-candidate pruning state, reset for every candidate.
#[derive(Debug, Clone)]
pub struct QualityBound {
    /// Measure the bound is for.
    measure: QualityMeasure,
    /// Amount of series per class in the complete orderline.
    totals: ClassCounts,
    /// Amount of seen series per class.
    seen: ClassCounts,
    /// Seen entries, sorted by distance.
    partial: Vec<OrderlineEntry>,
}

impl QualityBound {
    /// Empty state for orderlines with `totals` series per class.
    #[must_use]
    pub fn new(measure: QualityMeasure, totals: &[usize]) -> Self {
        Self {
            measure,
            totals: totals.iter().copied().collect(),
            seen: smallvec![0; totals.len()],
            partial: Vec::with_capacity(totals.iter().sum()),
        }
    }

    /// Start over for a new candidate.
    pub fn reset(&mut self) {
        self.seen.iter_mut().for_each(|count| *count = 0);
        self.partial.clear();
    }

    /// Add a computed entry.
    pub fn push(&mut self, entry: OrderlineEntry) {
        let position = self
            .partial
            .partition_point(|other| other.by_distance(&entry).is_lt());
        self.partial.insert(position, entry);
        self.seen[entry.class_id] += 1;
    }

    /// Amount of entries seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partial.len()
    }

    /// Whether nothing has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }

    /// Amount of classes on the orderline.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.totals.len()
    }

    /// Highest quality the completed orderline could still reach.
    ///
    /// Infinite when the measure has no usable bound.
    #[must_use]
    pub fn upper_bound(&self) -> f64 {
        match self.measure {
            QualityMeasure::InformationGain => self.information_gain_bound(f64::INFINITY),
            QualityMeasure::FStat | QualityMeasure::KruskalWallis | QualityMeasure::MoodsMedian => {
                f64::INFINITY
            }
        }
    }

    /// Whether the candidate can no longer beat `worst_quality`.
    ///
    /// Stops enumerating as soon as a reachable quality rules out pruning.
    #[must_use]
    pub fn can_prune(&self, worst_quality: f64) -> bool {
        match self.measure {
            QualityMeasure::InformationGain => {
                let target = worst_quality - PRUNING_SLACK;

                self.information_gain_bound(target) < target
            }
            QualityMeasure::FStat | QualityMeasure::KruskalWallis | QualityMeasure::MoodsMedian => {
                false
            }
        }
    }

    /// Information gain bound, see the module documentation.
    ///
    /// Returns as soon as the bound reaches `target`, the result is then a
    /// reachable quality of at least `target` instead of the maximum.
    fn information_gain_bound(&self, target: f64) -> f64 {
        let unseen = self
            .totals
            .iter()
            .zip(&self.seen)
            .map(|(total, seen)| total.saturating_sub(*seen))
            .collect::<ClassCounts>();
        let open = (0..unseen.len())
            .filter(|class_id| unseen[*class_id] > 0)
            .collect::<ClassCounts>();
        if open.len() > MAX_EXACT_CLASSES {
            return f64::INFINITY;
        }

        let mut best = 0.0_f64;

        // Majority placement first, it often reaches the target on its own
        if self.for_each_split(|prefix, left| {
            for class_id in open.iter() {
                if prefix[*class_id] * 2 >= self.seen[*class_id] {
                    left[*class_id] += unseen[*class_id];
                }
            }
            best = best.max(information_gain(left, &self.totals));

            best >= target
        }) {
            return best;
        }

        // Every placement of the open classes
        self.for_each_split(|prefix, left| {
            for placement in 0_u32..(1 << open.len()) {
                left.copy_from_slice(prefix);
                for (bit, class_id) in open.iter().enumerate() {
                    if placement & (1 << bit) != 0 {
                        left[*class_id] += unseen[*class_id];
                    }
                }
                best = best.max(information_gain(left, &self.totals));

                if best >= target {
                    return true;
                }
            }

            false
        });

        best
    }

    /// Call `visit` with the seen class counts left of every split and a
    /// scratch buffer holding a copy of them, until it returns `true`.
    ///
    /// Splits never fall between equal distances.
    fn for_each_split(&self, mut visit: impl FnMut(&[usize], &mut [usize]) -> bool) -> bool {
        let mut prefix: ClassCounts = smallvec![0; self.totals.len()];
        let mut left = prefix.clone();

        for split in 0..=self.partial.len() {
            if split > 0 {
                prefix[self.partial[split - 1].class_id] += 1;
            }
            let inside_tie = split > 0
                && split < self.partial.len()
                && self.partial[split - 1]
                    .distance
                    .total_cmp(&self.partial[split].distance)
                    .is_eq();
            if inside_tie {
                continue;
            }

            left.copy_from_slice(&prefix);
            if visit(&prefix, &mut left) {
                return true;
            }
        }

        false
    }
}
