//! Example of discovering shapelets in a labeled CSV file, the last column holds the labels.

use std::{error::Error, fs::File};

use csv::ReaderBuilder;
use ndarray::{Array2, s};
use ndarray_csv::Array2Reader as _;
use shapelets::{SeriesStore, ShapeletConfig, ShapeletTransform};

pub fn main() -> Result<(), Box<dyn Error>> {
    // Try to read each argument as a file
    for arg in std::env::args().skip(1) {
        eprintln!("Reading file '{arg}'");

        // Read CSV file
        let mut file = File::open(arg)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&mut file);

        // Convert to a corpus
        let matrix: Array2<f64> = reader.deserialize_array2_dynamic()?;
        let label_column = matrix.ncols().saturating_sub(1);
        let store = SeriesStore::univariate(
            matrix.slice(s![.., ..label_column]),
            &matrix.column(label_column).to_vec(),
        )?;

        // Run the discovery
        let max_length = store.series_length().saturating_sub(1).max(3);
        let mut transform = ShapeletTransform::new(
            ShapeletConfig::new(10)
                .with_length_range(3, max_length)
                .with_candidate_pruning(true, 10),
        );
        match transform.fit_transform(&store) {
            Ok(features) => {
                for shapelet in transform.shapelets().unwrap_or_default() {
                    println!(
                        "series {} start {} length {} quality {:.4}",
                        shapelet.series_id(),
                        shapelet.start(),
                        shapelet.length(),
                        shapelet.quality()
                    );
                }
                println!("{features:?}");
            }
            // Print the error
            Err(err) => eprintln!("Error discovering shapelets: {err}"),
        }
    }

    Ok(())
}
