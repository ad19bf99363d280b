//! Shared functionality between integration tests.

use std::io::Cursor;

use csv::ReaderBuilder;
use ndarray::{Array2, s};
use ndarray_csv::Array2Reader as _;
use shapelets::SeriesStore;

/// Load a matrix from a text file.
#[must_use]
pub fn load_matrix_fixture(file: &'static str) -> Array2<f64> {
    // Read CSV
    let mut cursor = Cursor::new(file);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(&mut cursor);

    // Convert to array
    reader
        .deserialize_array2_dynamic()
        .expect("Error deserializing CSV into array")
}

/// Load a univariate corpus from a text file, the last column holds the labels.
#[must_use]
pub fn load_labeled_fixture(file: &'static str) -> SeriesStore {
    let matrix = load_matrix_fixture(file);
    let label_column = matrix.ncols() - 1;

    let labels = matrix.column(label_column).to_vec();
    SeriesStore::univariate(matrix.slice(s![.., ..label_column]), &labels)
        .expect("Error constructing series store")
}

/// Three class corpus of 18 series with 24 values each.
#[must_use]
pub fn three_classes() -> SeriesStore {
    load_labeled_fixture(include_str!("three-classes.csv"))
}
