//! Shapelet discovery and distance feature transform for labeled time series.
//!
//! A shapelet is a z-normalized subsequence of a training series that
//! separates the classes well: the minimum distance of every series to it is
//! low for one group of classes and high for the others. Discovery searches the
//! candidate windows of a labeled corpus for the best `k` shapelets, the
//! transform turns any compatible series into a row of distances to them.
//!
//! ```
//! use shapelets::{SeriesStore, ShapeletConfig, ShapeletTransform};
//!
//! let store = SeriesStore::univariate(
//!     &ndarray::array![
//!         [0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
//!         [0.1, 0.0, 0.2, 5.1, 0.1, 0.0, 0.0, 0.1, 0.0, 0.2],
//!         [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
//!         [0.2, 1.1, 2.0, 3.1, 4.2, 5.0, 6.1, 7.0, 8.2, 9.1],
//!     ],
//!     &[0.0, 0.0, 1.0, 1.0],
//! )?;
//!
//! let mut transform = ShapeletTransform::new(ShapeletConfig::new(2).with_length_range(3, 5));
//! let features = transform.fit_transform(&store)?;
//! assert_eq!(features.dim(), (4, 3));
//! # Ok::<(), shapelets::Error>(())
//! ```

mod bound;
mod config;
mod discover;
mod distance;
mod error;
mod normalize;
pub mod persist;
mod planner;
mod quality;
mod search;
mod select;
mod series;
mod shapelet;
mod transform;

use std::path::Path;

pub use bound::{MAX_EXACT_CLASSES, PRUNING_SLACK, QualityBound};
pub use config::ShapeletConfig;
pub use discover::{CheckpointSink, Discovery, DiscoveryStats, discover};
pub use distance::{ChannelMode, DistanceKind, NormalizedDistance};
pub use error::Error;
use ndarray::Array2;
pub use normalize::{CANCELLATION_LIMIT, FLAT_TOLERANCE, PrefixStats, WindowStats, z_normalize};
pub use planner::{PlannerMode, SearchPlan, TimeBudgetPlanner, Workload};
pub use quality::{OrderlineEntry, QualityMeasure, QualityScore};
pub use search::{CandidateEnumerator, SearchKind, Window, WindowBounds};
pub use select::{BestK, combine, remove_self_similar};
pub use series::SeriesStore;
pub use shapelet::{Comparator, LengthPreference, RankBy, Shapelet, ShapeletContent};
use tracing::{info, instrument};
pub use transform::{check_compatible, transform};

/// Lifecycle of a transform.
#[derive(Debug, Clone, Default)]
enum State {
    /// Nothing discovered yet.
    #[default]
    NotStarted,
    /// Shapelets are known.
    Done {
        /// Final shapelets, with content.
        shapelets: Vec<Shapelet>,
        /// Counters of the run, absent when built from existing shapelets.
        stats: Option<DiscoveryStats>,
    },
}

/// Discovers shapelets once and transforms datasets with them.
///
/// # Defaults
///
/// See [`ShapeletConfig`].
#[derive(Debug, Clone)]
pub struct ShapeletTransform {
    /// Discovery settings.
    config: ShapeletConfig,
    /// Lifecycle.
    state: State,
}

impl ShapeletTransform {
    /// Construct a transform that still has to be fitted.
    #[must_use]
    pub const fn new(config: ShapeletConfig) -> Self {
        Self {
            config,
            state: State::NotStarted,
        }
    }

    /// Construct a fitted transform from known shapelets, for example a loaded log.
    ///
    /// # Errors
    ///
    /// - When there are no shapelets.
    /// - When a shapelet has no content.
    pub fn from_shapelets(config: ShapeletConfig, shapelets: Vec<Shapelet>) -> Result<Self, Error> {
        if shapelets.is_empty() {
            return Err(Error::NoShapelets);
        }
        if let Some(index) = shapelets
            .iter()
            .position(|shapelet| shapelet.content().is_none())
        {
            return Err(Error::MissingContent(index));
        }

        Ok(Self {
            config,
            state: State::Done {
                shapelets,
                stats: None,
            },
        })
    }

    /// Construct a fitted transform from a shapelet log file.
    ///
    /// # Errors
    ///
    /// - When the log can't be read or contains no shapelets.
    pub fn load(config: ShapeletConfig, path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_shapelets(config, persist::load(path)?)
    }

    /// Discover the shapelets of a corpus.
    ///
    /// Does nothing when the transform is already fitted.
    ///
    /// # Errors
    ///
    /// - When the configuration doesn't fit the corpus.
    /// - When no shapelet was found.
    pub fn fit(&mut self, store: &SeriesStore) -> Result<&[Shapelet], Error> {
        self.fit_with_checkpoint(store, &mut ())
    }

    /// Discover the shapelets of a corpus, reporting progress to `sink`.
    ///
    /// Does nothing when the transform is already fitted.
    ///
    /// # Errors
    ///
    /// - When the configuration doesn't fit the corpus.
    /// - When the checkpoint sink fails.
    /// - When no shapelet was found.
    #[instrument(skip_all, fields(series = store.len(), k = self.config.num_shapelets()))]
    pub fn fit_with_checkpoint(
        &mut self,
        store: &SeriesStore,
        sink: &mut impl CheckpointSink,
    ) -> Result<&[Shapelet], Error> {
        if let State::NotStarted = self.state {
            let Discovery { shapelets, stats, .. } = discover(store, &self.config, sink)?;
            self.state = State::Done {
                shapelets,
                stats: Some(stats),
            };
        } else {
            info!("Transform is already fitted, keeping the discovered shapelets");
        }

        self.shapelets().ok_or(Error::NotFitted)
    }

    /// Distance of every series to every shapelet, with the label in the last column.
    ///
    /// # Errors
    ///
    /// - When the transform is not fitted.
    /// - When a shapelet doesn't fit the series.
    pub fn transform(&self, store: &SeriesStore) -> Result<Array2<f64>, Error> {
        let shapelets = self.shapelets().ok_or(Error::NotFitted)?;

        transform(shapelets, store, self.config.distance())
    }

    /// Fit on a corpus and transform it.
    ///
    /// # Errors
    ///
    /// - When fitting or transforming fails.
    pub fn fit_transform(&mut self, store: &SeriesStore) -> Result<Array2<f64>, Error> {
        self.fit(store)?;

        self.transform(store)
    }

    /// Write the shapelets to a log file.
    ///
    /// # Errors
    ///
    /// - When the transform is not fitted or the file can't be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        persist::save(path, self.shapelets().ok_or(Error::NotFitted)?)
    }

    /// Forget the shapelets so the next fit discovers again.
    pub fn reset(&mut self) {
        self.state = State::NotStarted;
    }

    /// Discovered shapelets, best first.
    #[must_use]
    pub fn shapelets(&self) -> Option<&[Shapelet]> {
        match &self.state {
            State::NotStarted => None,
            State::Done { shapelets, .. } => Some(shapelets),
        }
    }

    /// Counters of the discovery run.
    #[must_use]
    pub fn stats(&self) -> Option<&DiscoveryStats> {
        match &self.state {
            State::NotStarted => None,
            State::Done { stats, .. } => stats.as_ref(),
        }
    }

    /// Whether shapelets are known.
    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        matches!(self.state, State::Done { .. })
    }

    /// Discovery settings.
    #[must_use]
    pub const fn config(&self) -> &ShapeletConfig {
        &self.config
    }
}
