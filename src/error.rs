//! Error types.

use std::path::PathBuf;

/// Errors that can occur during configuration, discovery, transform or persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested number of shapelets is zero.
    #[error("number of shapelets must be at least 1")]
    InvalidShapeletCount,
    /// Shapelet length bounds are not a valid range.
    #[error("invalid shapelet length range {min}..={max}, expected 1 <= min <= max")]
    InvalidLengthRange {
        /// Minimum shapelet length.
        min: usize,
        /// Maximum shapelet length.
        max: usize,
    },
    /// Maximum shapelet length does not fit in the series.
    #[error("maximum shapelet length {max} must be smaller than the series length {series_length}")]
    LengthExceedsSeries {
        /// Maximum shapelet length.
        max: usize,
        /// Length of every series in the corpus.
        series_length: usize,
    },
    /// A position or length step of zero.
    #[error("search steps must be at least 1")]
    InvalidStep,
    /// Random search asked for zero candidates per series.
    #[error("random search must sample at least one candidate per series")]
    InvalidSampleSize,
    /// Pruning start percentage outside of `0..=100`.
    #[error("candidate pruning start percentage {0} is not in 0..=100")]
    InvalidPruningPercentage(u8),
    /// Class balancing leaves no room for a single shapelet per class.
    #[error("{num_shapelets} shapelets cannot be balanced over {num_classes} classes")]
    ClassProportionTooSmall {
        /// Requested number of shapelets.
        num_shapelets: usize,
        /// Number of classes in the corpus.
        num_classes: usize,
    },
    /// Cost per operation for the time budget planner is zero.
    #[error("time per operation must be at least one nanosecond")]
    InvalidOperationCost,
    /// Dataset contains no series.
    #[error("dataset contains no series")]
    EmptyDataset,
    /// Series have no values or no channels.
    #[error("series must contain at least one channel with one value")]
    EmptySeries,
    /// Amount of labels differs from the amount of series.
    #[error("dataset has {series} series but {labels} labels")]
    LabelCountMismatch {
        /// Amount of series.
        series: usize,
        /// Amount of labels.
        labels: usize,
    },
    /// A series value is NaN or infinite.
    #[error("series {series} channel {channel} contains a non-finite value at index {index}")]
    NonFiniteValue {
        /// Series row.
        series: usize,
        /// Channel of the series.
        channel: usize,
        /// Position of the value.
        index: usize,
    },
    /// A label is NaN or infinite.
    #[error("label of series {0} is not finite")]
    NonFiniteLabel(usize),
    /// Discovery needs at least two distinct classes.
    #[error("discovery needs at least two classes, found {0}")]
    TooFewClasses(usize),
    /// A shapelet cannot be applied to a dataset.
    #[error("shapelet {index} (length {length}, dimension {dimension}) does not fit the dataset")]
    IncompatibleShapelet {
        /// Position of the shapelet in the set.
        index: usize,
        /// Length of the shapelet.
        length: usize,
        /// Channel the shapelet was taken from.
        dimension: usize,
    },
    /// Discovery finished without retaining a single shapelet.
    #[error("discovery did not find any shapelet")]
    NoShapelets,
    /// A shapelet without content can't be written or applied.
    #[error("shapelet {0} has no content")]
    MissingContent(usize),
    /// Transform was requested before discovery ran.
    #[error("shapelets have not been discovered yet")]
    NotFitted,
    /// The checkpoint sink rejected a checkpoint.
    #[error("checkpoint failed: {0}")]
    Checkpoint(String),
    /// Reading or writing a shapelet log failed.
    #[error("shapelet log at {} could not be accessed", path.display())]
    Io {
        /// Path of the log.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Shapelet log could not be encoded or decoded.
    #[error("shapelet log is not valid CSV")]
    Csv(#[from] csv::Error),
    /// Shapelet log is valid CSV but describes no valid shapelet.
    #[error("malformed shapelet log at record {record}: {reason}")]
    MalformedLog {
        /// Zero based record number, the header excluded.
        record: usize,
        /// What is wrong with it.
        reason: &'static str,
    },
}
