//! Fit a search into a time budget by counting point operations.

use std::time::Duration;

use tracing::info;

use crate::{
    Error,
    search::{SearchKind, WindowBounds},
};

/// How a search that doesn't fit the budget is reduced.
///
/// # Defaults
///
/// - [`PlannerMode::Sample`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlannerMode {
    /// Evaluate a random sample of windows per series.
    #[default]
    Sample,
    /// Stride over positions and lengths.
    Skip,
}

/// Shape of the corpus a plan is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    /// Amount of series.
    pub num_series: usize,
    /// Length of every series.
    pub series_length: usize,
    /// Amount of channels of every series.
    pub num_channels: usize,
    /// Channels a window can start on.
    pub dimensions: usize,
    /// Size of the smallest class.
    pub smallest_class: usize,
    /// Enumerated windows.
    pub bounds: WindowBounds,
}

impl Workload {
    /// Point operations of a full search with the given strides.
    ///
    /// `n (n - 1) * sum over lengths L of ceil((m - L + 1) / p) (m - L + 1) L`,
    /// times the amount of channels.
    #[must_use]
    pub fn operation_count(&self, bounds: WindowBounds) -> u128 {
        let series = self.num_series as u128;
        let pairs = series * series.saturating_sub(1);
        let channels = self.num_channels as u128;
        let max_length = bounds.max_length.min(self.series_length);
        if bounds.min_length > max_length {
            return 0;
        }

        let per_pair = if bounds.length_step == 1 && bounds.position_step == 1 {
            closed_form(self.series_length as u128, bounds.min_length as u128, max_length as u128)
        } else {
            (bounds.min_length..=max_length)
                .step_by(bounds.length_step)
                .map(|length| {
                    let positions = (self.series_length - length + 1) as u128;

                    positions.div_ceil(bounds.position_step as u128) * positions * length as u128
                })
                .sum()
        };

        pairs * per_pair * channels
    }

    /// Windows in a single series with the given strides.
    #[must_use]
    pub fn windows_per_series(&self, bounds: WindowBounds) -> usize {
        bounds
            .lengths()
            .filter(|length| *length <= self.series_length)
            .map(|length| (self.series_length - length + 1).div_ceil(bounds.position_step))
            .sum::<usize>()
            * self.dimensions
    }
}

/// `sum over L in min..=max of (m - L + 1)^2 L`, expanded into power sums.
fn closed_form(series_length: u128, min: u128, max: u128) -> u128 {
    // Power sums 1^k + 2^k + .. + n^k
    let first = |n: u128| n * (n + 1) / 2;
    let second = |n: u128| n * (n + 1) * (2 * n + 1) / 6;
    let third = |n: u128| first(n) * first(n);

    let lengths = first(max) - first(min - 1);
    let squares = second(max) - second(min - 1);
    let cubes = third(max) - third(min - 1);
    let offset = series_length + 1;

    // (o - L)^2 L = o^2 L - 2 o L^2 + L^3, the total is never negative
    offset * offset * lengths + cubes - 2 * offset * squares
}

/// Result of planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPlan {
    /// Strategy to enumerate with.
    pub search: SearchKind,
    /// Target amount of shapelets.
    pub num_shapelets: usize,
    /// Point operations of the full search.
    pub estimated_operations: u128,
    /// Point operations the budget allows.
    pub allowed_operations: u128,
    /// Whether the full search exceeds the budget.
    pub exceeds_budget: bool,
}

/// Reduces a search until it fits a time budget.
///
/// # Defaults
///
/// - `nanos_per_operation`: `10`
/// - `min_class_representation`: `25`
/// - `min_shapelets`: `1`
/// - `mode`: [`PlannerMode::Sample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudgetPlanner {
    /// Available time.
    budget: Duration,
    /// Estimated time of a single point operation.
    nanos_per_operation: u64,
    /// Minimum amount of candidates evaluated per class.
    min_class_representation: usize,
    /// Lower bound of the target amount of shapelets.
    min_shapelets: usize,
    /// Reduction strategy.
    mode: PlannerMode,
}

impl TimeBudgetPlanner {
    /// Planner with default costs.
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self {
            budget,
            nanos_per_operation: 10,
            min_class_representation: 25,
            min_shapelets: 1,
            mode: PlannerMode::Sample,
        }
    }

    /// Set the estimated time of a single point operation.
    #[must_use]
    pub const fn with_nanos_per_operation(mut self, nanos_per_operation: u64) -> Self {
        self.nanos_per_operation = nanos_per_operation;

        self
    }

    /// Set the minimum amount of candidates evaluated per class.
    #[must_use]
    pub const fn with_min_class_representation(mut self, min_class_representation: usize) -> Self {
        self.min_class_representation = min_class_representation;

        self
    }

    /// Set the lower bound of the target amount of shapelets.
    #[must_use]
    pub const fn with_min_shapelets(mut self, min_shapelets: usize) -> Self {
        self.min_shapelets = min_shapelets;

        self
    }

    /// Set the reduction strategy.
    #[must_use]
    pub const fn with_mode(mut self, mode: PlannerMode) -> Self {
        self.mode = mode;

        self
    }

    /// Pick a search and a target amount of shapelets that fit the budget.
    ///
    /// # Errors
    ///
    /// - When the time per operation is zero.
    pub fn plan(&self, workload: &Workload, num_shapelets: usize) -> Result<SearchPlan, Error> {
        if self.nanos_per_operation == 0 {
            return Err(Error::InvalidOperationCost);
        }

        let estimated_operations = workload.operation_count(workload.bounds);
        let allowed_operations = self.budget.as_nanos() / u128::from(self.nanos_per_operation);
        let windows = workload.windows_per_series(workload.bounds);

        if estimated_operations <= allowed_operations {
            info!(
                operations = estimated_operations,
                allowed = allowed_operations,
                "Full search fits the time budget"
            );

            return Ok(SearchPlan {
                search: SearchKind::Full,
                num_shapelets,
                estimated_operations,
                allowed_operations,
                exceeds_budget: false,
            });
        }

        let (search, per_series) = match self.mode {
            PlannerMode::Sample => self.sample(workload, windows, estimated_operations, allowed_operations),
            PlannerMode::Skip => self.skip(workload, allowed_operations),
        };

        // Never more shapelets than evaluated candidates, never fewer than the minimum
        let evaluated = per_series.saturating_mul(workload.num_series);
        let num_shapelets = num_shapelets.min(evaluated).max(self.min_shapelets);

        info!(
            operations = estimated_operations,
            allowed = allowed_operations,
            per_series,
            num_shapelets,
            ?search,
            "Reduced search to fit the time budget"
        );

        Ok(SearchPlan {
            search,
            num_shapelets,
            estimated_operations,
            allowed_operations,
            exceeds_budget: true,
        })
    }

    /// Random sample proportional to the budget.
    fn sample(
        &self,
        workload: &Workload,
        windows: usize,
        estimated: u128,
        allowed: u128,
    ) -> (SearchKind, usize) {
        let proportion = allowed as f64 / estimated as f64;
        let per_series = ((windows as f64 * proportion).floor() as usize)
            .max(self.min_per_series(workload))
            .max(1);

        if per_series >= windows {
            (SearchKind::Full, windows)
        } else {
            (SearchKind::Random { per_series }, per_series)
        }
    }

    /// Smallest common stride for positions and lengths that fits.
    fn skip(&self, workload: &Workload, allowed: u128) -> (SearchKind, usize) {
        let strided = |step: usize| WindowBounds {
            length_step: step,
            position_step: step,
            ..workload.bounds
        };

        let max_step = workload.series_length.max(2);
        let mut step = (2..=max_step)
            .find(|step| workload.operation_count(strided(*step)) <= allowed)
            .unwrap_or(max_step);

        // Give back speed until every class is represented enough
        while step > 1
            && workload.windows_per_series(strided(step)) < self.min_per_series(workload)
        {
            step -= 1;
        }

        let per_series = workload.windows_per_series(strided(step));
        if step <= 1 {
            (SearchKind::Full, per_series)
        } else {
            (
                SearchKind::Skipping {
                    position_step: step,
                    length_step: step,
                },
                per_series,
            )
        }
    }

    /// Candidates per series needed to represent the smallest class.
    fn min_per_series(&self, workload: &Workload) -> usize {
        self.min_class_representation
            .div_ceil(workload.smallest_class.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Workload with unit strides.
    fn workload(num_series: usize, series_length: usize, min: usize, max: usize) -> Workload {
        Workload {
            num_series,
            series_length,
            num_channels: 1,
            dimensions: 1,
            smallest_class: num_series / 2,
            bounds: WindowBounds {
                min_length: min,
                max_length: max,
                length_step: 1,
                position_step: 1,
            },
        }
    }

    /// Power sums agree with the direct summation.
    #[test]
    fn closed_form_matches_summation() {
        for (series_length, min, max) in [(10, 3, 5), (100, 3, 99), (57, 1, 1), (20, 7, 19)] {
            let direct = (min..=max)
                .map(|length: u128| (series_length - length + 1).pow(2) * length)
                .sum::<u128>();

            assert_eq!(closed_form(series_length, min, max), direct);
        }

        // 4 * 3 pairs, lengths 3..=5 on 10 values: 8^2 * 3 + 7^2 * 4 + 6^2 * 5
        assert_eq!(workload(4, 10, 3, 5).operation_count(workload(4, 10, 3, 5).bounds), 12 * 568);
    }

    /// A generous budget keeps the full search.
    #[test]
    fn full_fits() {
        let plan = TimeBudgetPlanner::new(Duration::from_secs(3600))
            .plan(&workload(10, 50, 3, 49), 10)
            .expect("Valid planner");

        assert_eq!(plan.search, SearchKind::Full);
        assert_eq!(plan.num_shapelets, 10);
        assert!(!plan.exceeds_budget);
    }

    /// A tight budget samples, but keeps the classes represented.
    #[test]
    fn sample_respects_representation() {
        let workload = workload(100, 200, 3, 199);
        let plan = TimeBudgetPlanner::new(Duration::from_millis(1))
            .plan(&workload, 1000)
            .expect("Valid planner");

        // 25 candidates over a class of 50 series
        assert_eq!(plan.search, SearchKind::Random { per_series: 1 });
        assert_eq!(plan.num_shapelets, 100);
        assert!(plan.exceeds_budget);

        let plan = TimeBudgetPlanner::new(Duration::from_millis(1))
            .with_min_class_representation(500)
            .plan(&workload, 1000)
            .expect("Valid planner");
        assert_eq!(plan.search, SearchKind::Random { per_series: 10 });
    }

    /// Skipping picks the smallest stride that fits.
    #[test]
    fn skip() {
        let workload = workload(20, 100, 3, 99);
        let allowed = workload.operation_count(WindowBounds {
            length_step: 3,
            position_step: 3,
            ..workload.bounds
        });
        let plan = TimeBudgetPlanner::new(Duration::from_nanos(u64::try_from(allowed).unwrap_or(u64::MAX)))
            .with_nanos_per_operation(1)
            .with_min_class_representation(1)
            .with_mode(PlannerMode::Skip)
            .plan(&workload, 10)
            .expect("Valid planner");

        assert_eq!(
            plan.search,
            SearchKind::Skipping {
                position_step: 3,
                length_step: 3
            }
        );
    }

    /// Zero cost per operation is rejected.
    #[test]
    fn invalid_cost() {
        assert!(matches!(
            TimeBudgetPlanner::new(Duration::from_secs(1))
                .with_nanos_per_operation(0)
                .plan(&workload(4, 10, 3, 5), 1),
            Err(Error::InvalidOperationCost)
        ));
    }
}
