//! Discovery configuration.

use std::time::Duration;

use crate::{
    ChannelMode, DistanceKind, Error, LengthPreference, PlannerMode, QualityMeasure, RankBy,
    SearchKind, TimeBudgetPlanner,
    search::WindowBounds,
    shapelet::Comparator,
};

/// Settings for shapelet discovery.
///
/// # Defaults
///
/// - `min_length`: `3`
/// - `max_length`: `23`
/// - `length_step`: `1`
/// - `position_step`: `1`
/// - `quality_measure`: [`QualityMeasure::InformationGain`]
/// - `use_self_similarity_removal`: `true`
/// - `use_candidate_pruning`: `false`
/// - `candidate_pruning_start_percentage`: `10`
/// - `class_balancing`: `false`
/// - `round_robin`: `false`
/// - `binary_class_value`: `false`
/// - `time_budget`: `None`
/// - `random_seed`: `0`
/// - `search`: [`SearchKind::Full`]
/// - `distance`: [`DistanceKind::Direct`]
/// - `channel_mode`: [`ChannelMode::Independent`]
/// - `rank_by`: [`RankBy::Quality`]
/// - `length_preference`: [`LengthPreference::Shorter`]
/// - `nanos_per_operation`: `10`
/// - `min_class_representation`: `25`
/// - `min_shapelets`: `1`
/// - `planner_mode`: [`PlannerMode::Sample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeletConfig {
    /// Amount of shapelets to keep.
    pub(crate) num_shapelets: usize,
    /// Shortest candidate.
    pub(crate) min_length: usize,
    /// Longest candidate.
    pub(crate) max_length: usize,
    /// Stride between candidate lengths.
    pub(crate) length_step: usize,
    /// Stride between candidate start positions.
    pub(crate) position_step: usize,
    /// Statistic to rate candidates with.
    pub(crate) quality_measure: QualityMeasure,
    /// Drop overlapping candidates of the same series.
    pub(crate) use_self_similarity_removal: bool,
    /// Stop scoring candidates that can't enter the best shapelets.
    pub(crate) use_candidate_pruning: bool,
    /// Percentage of the corpus to compare before pruning starts.
    pub(crate) candidate_pruning_start_percentage: u8,
    /// Keep an equal amount of shapelets per class.
    pub(crate) class_balancing: bool,
    /// Visit series by cycling through the classes.
    pub(crate) round_robin: bool,
    /// Score candidates as their own class against all others.
    pub(crate) binary_class_value: bool,
    /// Wall clock budget for discovery.
    pub(crate) time_budget: Option<Duration>,
    /// Seed of randomized search.
    pub(crate) random_seed: u64,
    /// Window selection.
    pub(crate) search: SearchKind,
    /// Window statistics strategy.
    pub(crate) distance: DistanceKind,
    /// Relation between candidates and channels.
    pub(crate) channel_mode: ChannelMode,
    /// Primary ranking statistic.
    pub(crate) rank_by: RankBy,
    /// Length tie-break.
    pub(crate) length_preference: LengthPreference,
    /// Estimated time of a single point operation.
    pub(crate) nanos_per_operation: u64,
    /// Minimum amount of candidates per class when the budget is tight.
    pub(crate) min_class_representation: usize,
    /// Lower bound of the planned amount of shapelets.
    pub(crate) min_shapelets: usize,
    /// How the planner reduces a search.
    pub(crate) planner_mode: PlannerMode,
}

impl ShapeletConfig {
    /// Keep `num_shapelets` shapelets, everything else default.
    #[must_use]
    pub const fn new(num_shapelets: usize) -> Self {
        Self {
            num_shapelets,
            min_length: 3,
            max_length: 23,
            length_step: 1,
            position_step: 1,
            quality_measure: QualityMeasure::InformationGain,
            use_self_similarity_removal: true,
            use_candidate_pruning: false,
            candidate_pruning_start_percentage: 10,
            class_balancing: false,
            round_robin: false,
            binary_class_value: false,
            time_budget: None,
            random_seed: 0,
            search: SearchKind::Full,
            distance: DistanceKind::Direct,
            channel_mode: ChannelMode::Independent,
            rank_by: RankBy::Quality,
            length_preference: LengthPreference::Shorter,
            nanos_per_operation: 10,
            min_class_representation: 25,
            min_shapelets: 1,
            planner_mode: PlannerMode::Sample,
        }
    }

    /// Set the candidate length range, both inclusive.
    #[must_use]
    pub const fn with_length_range(mut self, min_length: usize, max_length: usize) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;

        self
    }

    /// Set the stride between candidate lengths and between start positions.
    #[must_use]
    pub const fn with_steps(mut self, length_step: usize, position_step: usize) -> Self {
        self.length_step = length_step;
        self.position_step = position_step;

        self
    }

    /// Set the statistic candidates are rated with.
    #[must_use]
    pub const fn with_quality_measure(mut self, quality_measure: QualityMeasure) -> Self {
        self.quality_measure = quality_measure;

        self
    }

    /// Toggle dropping overlapping candidates of the same series.
    #[must_use]
    pub const fn with_self_similarity_removal(mut self, enabled: bool) -> Self {
        self.use_self_similarity_removal = enabled;

        self
    }

    /// Prune candidates that can't enter the best shapelets.
    ///
    /// Pruning starts once `start_percentage` percent of the corpus is compared.
    #[must_use]
    pub const fn with_candidate_pruning(mut self, enabled: bool, start_percentage: u8) -> Self {
        self.use_candidate_pruning = enabled;
        self.candidate_pruning_start_percentage = start_percentage;

        self
    }

    /// Toggle keeping an equal amount of shapelets per class.
    #[must_use]
    pub const fn with_class_balancing(mut self, enabled: bool) -> Self {
        self.class_balancing = enabled;

        self
    }

    /// Toggle visiting the series by cycling through the classes.
    #[must_use]
    pub const fn with_round_robin(mut self, enabled: bool) -> Self {
        self.round_robin = enabled;

        self
    }

    /// Toggle scoring candidates one class against all others.
    #[must_use]
    pub const fn with_binary_class_value(mut self, enabled: bool) -> Self {
        self.binary_class_value = enabled;

        self
    }

    /// Limit discovery to a wall clock budget.
    #[must_use]
    pub const fn with_time_budget(mut self, time_budget: Option<Duration>) -> Self {
        self.time_budget = time_budget;

        self
    }

    /// Set the seed of randomized search.
    #[must_use]
    pub const fn with_random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;

        self
    }

    /// Set how windows are picked, a time budget can override it.
    #[must_use]
    pub const fn with_search(mut self, search: SearchKind) -> Self {
        self.search = search;

        self
    }

    /// Set how window statistics are obtained.
    #[must_use]
    pub const fn with_distance(mut self, distance: DistanceKind) -> Self {
        self.distance = distance;

        self
    }

    /// Set how candidates relate to channels.
    #[must_use]
    pub const fn with_channel_mode(mut self, channel_mode: ChannelMode) -> Self {
        self.channel_mode = channel_mode;

        self
    }

    /// Set the ranking of shapelets.
    #[must_use]
    pub const fn with_ranking(mut self, rank_by: RankBy, length_preference: LengthPreference) -> Self {
        self.rank_by = rank_by;
        self.length_preference = length_preference;

        self
    }

    /// Set the cost estimates of the time budget planner.
    #[must_use]
    pub const fn with_planner(
        mut self,
        planner_mode: PlannerMode,
        nanos_per_operation: u64,
        min_class_representation: usize,
        min_shapelets: usize,
    ) -> Self {
        self.planner_mode = planner_mode;
        self.nanos_per_operation = nanos_per_operation;
        self.min_class_representation = min_class_representation;
        self.min_shapelets = min_shapelets;

        self
    }

    /// Amount of shapelets to keep.
    #[must_use]
    pub const fn num_shapelets(&self) -> usize {
        self.num_shapelets
    }

    /// Wall clock budget for discovery.
    #[must_use]
    pub const fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }

    /// Distance strategy, also used by the transform.
    #[must_use]
    pub const fn distance(&self) -> DistanceKind {
        self.distance
    }

    /// Relation between candidates and channels.
    #[must_use]
    pub const fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    /// Check everything that doesn't depend on the data.
    ///
    /// # Errors
    ///
    /// - When any setting is out of its range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_shapelets == 0 {
            return Err(Error::InvalidShapeletCount);
        }
        self.window_bounds().validate()?;
        if self.candidate_pruning_start_percentage > 100 {
            return Err(Error::InvalidPruningPercentage(
                self.candidate_pruning_start_percentage,
            ));
        }
        match self.search {
            SearchKind::Random { per_series: 0 } => return Err(Error::InvalidSampleSize),
            SearchKind::Skipping {
                position_step: 0, ..
            }
            | SearchKind::Skipping { length_step: 0, .. } => return Err(Error::InvalidStep),
            SearchKind::Full | SearchKind::Random { .. } | SearchKind::Skipping { .. } => (),
        }
        if self.time_budget.is_some() && self.nanos_per_operation == 0 {
            return Err(Error::InvalidOperationCost);
        }

        Ok(())
    }

    /// Candidate window bounds.
    pub(crate) const fn window_bounds(&self) -> WindowBounds {
        WindowBounds {
            min_length: self.min_length,
            max_length: self.max_length,
            length_step: self.length_step,
            position_step: self.position_step,
        }
    }

    /// Shapelet ordering.
    pub(crate) const fn comparator(&self) -> Comparator {
        Comparator {
            rank_by: self.rank_by,
            length_preference: self.length_preference,
        }
    }

    /// Planner for the time budget, if any.
    pub(crate) fn planner(&self) -> Option<TimeBudgetPlanner> {
        self.time_budget.map(|budget| {
            TimeBudgetPlanner::new(budget)
                .with_nanos_per_operation(self.nanos_per_operation)
                .with_min_class_representation(self.min_class_representation)
                .with_min_shapelets(self.min_shapelets)
                .with_mode(self.planner_mode)
        })
    }

    /// Whether pruning applies, ranking by gap breaks the quality bound.
    pub(crate) fn prunes(&self) -> bool {
        self.use_candidate_pruning && self.rank_by == RankBy::Quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Defaults are valid, ranges are checked.
    #[test]
    fn validation() {
        assert!(ShapeletConfig::new(10).validate().is_ok());
        assert!(matches!(
            ShapeletConfig::new(0).validate(),
            Err(Error::InvalidShapeletCount)
        ));
        assert!(matches!(
            ShapeletConfig::new(1).with_length_range(5, 4).validate(),
            Err(Error::InvalidLengthRange { min: 5, max: 4 })
        ));
        assert!(matches!(
            ShapeletConfig::new(1).with_steps(0, 1).validate(),
            Err(Error::InvalidStep)
        ));
        assert!(matches!(
            ShapeletConfig::new(1)
                .with_candidate_pruning(true, 101)
                .validate(),
            Err(Error::InvalidPruningPercentage(101))
        ));
        assert!(matches!(
            ShapeletConfig::new(1)
                .with_search(SearchKind::Random { per_series: 0 })
                .validate(),
            Err(Error::InvalidSampleSize)
        ));
        assert!(matches!(
            ShapeletConfig::new(1)
                .with_time_budget(Some(Duration::from_secs(1)))
                .with_planner(PlannerMode::Sample, 0, 25, 1)
                .validate(),
            Err(Error::InvalidOperationCost)
        ));
    }

    /// Ranking by gap turns pruning off.
    #[test]
    fn pruning_needs_quality_ranking() {
        let config = ShapeletConfig::new(1).with_candidate_pruning(true, 10);
        assert!(config.prunes());
        assert!(
            !config
                .with_ranking(RankBy::SeparationGap, LengthPreference::Shorter)
                .prunes()
        );
    }
}
