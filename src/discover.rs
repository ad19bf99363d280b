//! Shapelet discovery loop.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    Error, Shapelet, ShapeletConfig,
    bound::QualityBound,
    distance::NormalizedDistance,
    planner::{SearchPlan, Workload},
    quality::{ClassCounts, OrderlineEntry},
    search::{CandidateEnumerator, Window},
    select::{BestK, remove_self_similar},
    series::SeriesStore,
    shapelet::window_content,
};

/// Receives the best shapelets after every visited series.
pub trait CheckpointSink {
    /// Store a snapshot of the best shapelets so far.
    ///
    /// # Errors
    ///
    /// - When the checkpoint could not be stored, discovery stops with the error.
    fn checkpoint(&mut self, series_visited: usize, best: &BestK) -> Result<(), Error>;
}

/// No checkpoints.
impl CheckpointSink for () {
    fn checkpoint(&mut self, _series_visited: usize, _best: &BestK) -> Result<(), Error> {
        Ok(())
    }
}

/// Counters of a discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Series whose candidates were evaluated.
    pub series_visited: usize,
    /// Candidates that were scored completely.
    pub candidates_evaluated: usize,
    /// Candidates dropped by the quality bound.
    pub candidates_pruned: usize,
    /// Candidate to series distance computations.
    pub series_comparisons: usize,
    /// Estimated point operations of all comparisons.
    pub point_operations: u128,
    /// Wall clock time of the run.
    pub elapsed: Duration,
    /// Whether the time budget ended the run before every series was visited.
    pub time_box_expired: bool,
}

/// Result of a discovery run.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Best shapelets, with content.
    pub shapelets: Vec<Shapelet>,
    /// Counters.
    pub stats: DiscoveryStats,
    /// Plan made for the time budget, if any.
    pub plan: Option<SearchPlan>,
}

/// Find the best shapelets of a corpus.
///
/// # Errors
///
/// - When the configuration is invalid or doesn't fit the corpus.
/// - When the corpus has fewer than two classes.
/// - When the checkpoint sink fails.
/// - When no shapelet was found.
pub fn discover(
    store: &SeriesStore,
    config: &ShapeletConfig,
    sink: &mut impl CheckpointSink,
) -> Result<Discovery, Error> {
    DiscoverImpl::new(store, config)?.run(sink)
}

/// Implementation of discovery with state.
struct DiscoverImpl<'a> {
    /// Corpus.
    store: &'a SeriesStore,
    /// Settings.
    config: &'a ShapeletConfig,
    /// Distance against the corpus.
    distance: NormalizedDistance<'a>,
    /// Window source.
    enumerator: CandidateEnumerator,
    /// Best shapelets so far.
    best: BestK,
    /// Pruning state of the current candidate.
    bound: QualityBound,
    /// Orderline of the current candidate, reused between candidates.
    orderline: Vec<OrderlineEntry>,
    /// Time budget plan.
    plan: Option<SearchPlan>,
    /// Counters.
    stats: DiscoveryStats,
}

impl<'a> DiscoverImpl<'a> {
    /// Validate and set up the structures.
    fn new(store: &'a SeriesStore, config: &'a ShapeletConfig) -> Result<Self, Error> {
        config.validate()?;
        if store.num_classes() < 2 {
            return Err(Error::TooFewClasses(store.num_classes()));
        }

        let bounds = config.window_bounds();
        let dimensions = config.channel_mode.dimensions(store.num_channels());

        // Let the planner override the search and the amount of shapelets
        let plan = config
            .planner()
            .map(|planner| {
                planner.plan(
                    &Workload {
                        num_series: store.len(),
                        series_length: store.series_length(),
                        num_channels: store.num_channels(),
                        dimensions,
                        smallest_class: store.smallest_class(),
                        bounds,
                    },
                    config.num_shapelets,
                )
            })
            .transpose()?;
        let (search, num_shapelets) = plan.map_or((config.search, config.num_shapelets), |plan| {
            (plan.search, plan.num_shapelets)
        });

        let enumerator = CandidateEnumerator::new(
            bounds,
            search,
            store.series_length(),
            dimensions,
            config.random_seed,
        )?;

        let best = if config.class_balancing {
            BestK::per_class(num_shapelets, store.num_classes())?
        } else {
            BestK::global(num_shapelets)
        };

        // Binary scoring only needs two classes, the totals differ per candidate class
        let totals: ClassCounts = if config.binary_class_value {
            smallvec::smallvec![0, 0]
        } else {
            store.class_counts().iter().copied().collect()
        };

        Ok(Self {
            store,
            config,
            distance: NormalizedDistance::new(store, config.distance),
            enumerator,
            best,
            bound: QualityBound::new(config.quality_measure, &totals),
            orderline: Vec::with_capacity(store.len()),
            plan,
            stats: DiscoveryStats::default(),
        })
    }

    /// Visit every series, or until the time budget runs out.
    fn run(mut self, sink: &mut impl CheckpointSink) -> Result<Discovery, Error> {
        let started = Instant::now();
        let order = if self.config.round_robin {
            self.store.round_robin_order()
        } else {
            self.store.input_order()
        };

        info!(
            series = self.store.len(),
            classes = self.store.num_classes(),
            candidates_per_series = self.enumerator.candidates_per_series(),
            "Starting shapelet discovery"
        );

        let comparator = self.config.comparator();
        for (visited, series) in order.iter().copied().enumerate() {
            // Binary scoring uses its own totals per class
            if self.config.binary_class_value {
                self.bound = QualityBound::new(self.config.quality_measure, &self.binary_totals(series));
            }

            let mut candidates = self
                .enumerator
                .next_series()
                .into_iter()
                .filter_map(|window| self.evaluate(series, window))
                .collect::<Vec<_>>();
            comparator.sort(&mut candidates);
            if self.config.use_self_similarity_removal {
                candidates = remove_self_similar(candidates);
            }

            debug!(series, candidates = candidates.len(), "Visited series");

            let class_id = self.store.class_id(series);
            self.best.merge(class_id, candidates, comparator);
            for shapelet in self.best.iter_mut() {
                shapelet.materialize(self.store, self.config.channel_mode);
            }

            self.stats.series_visited += 1;
            sink.checkpoint(self.stats.series_visited, &self.best)?;

            // The time box is only checked between series
            if let Some(budget) = self.config.time_budget
                && visited + 1 < order.len()
                && started.elapsed() >= budget
            {
                warn!(
                    visited = self.stats.series_visited,
                    total = order.len(),
                    "Time budget expired, stopping discovery early"
                );
                self.stats.time_box_expired = true;
                break;
            }
        }
        self.stats.elapsed = started.elapsed();

        if self.best.is_empty() {
            return Err(Error::NoShapelets);
        }

        info!(
            shapelets = self.best.len(),
            evaluated = self.stats.candidates_evaluated,
            pruned = self.stats.candidates_pruned,
            elapsed = ?self.stats.elapsed,
            "Finished shapelet discovery"
        );

        Ok(Discovery {
            shapelets: self.best.into_shapelets(),
            stats: self.stats,
            plan: self.plan,
        })
    }

    /// Score a single candidate against the whole corpus, `None` when pruned.
    fn evaluate(&mut self, series: usize, window: Window) -> Option<Shapelet> {
        let content = window_content(self.store, series, window, self.config.channel_mode);
        let class_id = self.store.class_id(series);

        // Worst quality to beat, only when the relevant collection is full
        let worst = self
            .config
            .prunes()
            .then(|| self.best.worst_quality(class_id))
            .flatten();
        let pruning_start =
            usize::from(self.config.candidate_pruning_start_percentage) * self.store.len();

        self.bound.reset();
        self.orderline.clear();

        // The origin series always matches perfectly
        let own = OrderlineEntry {
            distance: 0.0,
            class_id: self.orderline_class(class_id, series),
        };
        self.orderline.push(own);
        self.bound.push(own);

        let windows = self.store.series_length() - window.length + 1;
        let channels = content.len();
        for other in (0..self.store.len()).filter(|other| *other != series) {
            // Only check once every class could have shown up again
            if let Some(worst) = worst
                && self.bound.len() * 100 >= pruning_start
                && self.bound.len() % self.bound.num_classes() == 0
                && self.bound.can_prune(worst)
            {
                self.stats.candidates_pruned += 1;
                return None;
            }

            let entry = OrderlineEntry {
                distance: self.distance.distance(&content, window.dimension, other),
                class_id: self.orderline_class(class_id, other),
            };
            self.orderline.push(entry);
            if worst.is_some() {
                self.bound.push(entry);
            }

            self.stats.series_comparisons += 1;
            self.stats.point_operations += (windows * window.length * channels) as u128;
        }

        let num_classes = if self.config.binary_class_value {
            2
        } else {
            self.store.num_classes()
        };
        let score = self
            .config
            .quality_measure
            .score(&mut self.orderline, num_classes);
        self.stats.candidates_evaluated += 1;

        Some(Shapelet::candidate(
            window,
            score,
            channels,
            series,
            self.store.label(series),
        ))
    }

    /// Class of `other` on the orderline of a candidate of class `class_id`.
    #[inline]
    fn orderline_class(&self, class_id: usize, other: usize) -> usize {
        let other_class = self.store.class_id(other);

        if self.config.binary_class_value {
            usize::from(other_class == class_id)
        } else {
            other_class
        }
    }

    /// Totals of the one-vs-all orderline of a candidate from `series`.
    fn binary_totals(&self, series: usize) -> [usize; 2] {
        let own = self.store.class_counts()[self.store.class_id(series)];

        [self.store.len() - own, own]
    }
}
