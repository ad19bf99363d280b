//! Distance feature matrix.

use ndarray::Array2;
use tracing::{debug, instrument};

use crate::{
    DistanceKind, Error, Shapelet, distance::NormalizedDistance, series::SeriesStore,
};

/// Check that every shapelet can be compared against the series of `store`.
///
/// # Errors
///
/// - When a shapelet has no content, is too long, or its channels don't exist.
pub fn check_compatible(shapelets: &[Shapelet], store: &SeriesStore) -> Result<(), Error> {
    for (index, shapelet) in shapelets.iter().enumerate() {
        let channels = shapelet.content().map(<[Vec<f64>]>::len).unwrap_or_default();
        let fits_channels = match channels {
            0 => false,
            1 => shapelet.dimension() < store.num_channels(),
            _ => channels == store.num_channels(),
        };

        if !fits_channels || shapelet.length() > store.series_length() {
            return Err(Error::IncompatibleShapelet {
                index,
                length: shapelet.length(),
                dimension: shapelet.dimension(),
            });
        }
    }

    Ok(())
}

/// Distance of every series to every shapelet, with the label in the last column.
///
/// The result has a row per series and a column per shapelet, plus the label.
///
/// # Errors
///
/// - When a shapelet doesn't fit the series of `store`.
#[instrument(skip_all, fields(series = store.len(), shapelets = shapelets.len()))]
pub fn transform(
    shapelets: &[Shapelet],
    store: &SeriesStore,
    kind: DistanceKind,
) -> Result<Array2<f64>, Error> {
    check_compatible(shapelets, store)?;

    let distance = NormalizedDistance::new(store, kind);

    #[cfg(feature = "rayon")]
    let columns = par_columns(shapelets, &distance);
    #[cfg(not(feature = "rayon"))]
    let columns = shapelets
        .iter()
        .map(|shapelet| column(shapelet, &distance))
        .collect::<Vec<_>>();

    debug!("Computed all distance columns");

    let num_shapelets = shapelets.len();
    Ok(Array2::from_shape_fn(
        (store.len(), num_shapelets + 1),
        |(series, feature)| {
            if feature == num_shapelets {
                store.label(series)
            } else {
                columns[feature][series]
            }
        },
    ))
}

/// Distances of one shapelet to every series.
#[inline]
fn column(shapelet: &Shapelet, distance: &NormalizedDistance) -> Vec<f64> {
    let content = shapelet.content().unwrap_or_default();

    (0..distance.num_series())
        .map(|series| distance.distance(content, shapelet.dimension(), series))
        .collect()
}

/// Columns spread across threads, the result is identical.
#[cfg(feature = "rayon")]
fn par_columns(shapelets: &[Shapelet], distance: &NormalizedDistance) -> Vec<Vec<f64>> {
    use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

    shapelets
        .par_iter()
        .map(|shapelet| column(shapelet, distance))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::normalize::z_normalize;

    use super::*;

    /// Shapelet with raw content.
    fn shapelet(values: &[f64], dimension: usize) -> Shapelet {
        Shapelet::from_content(1.0, 0, 0, dimension, 0.0, [values.to_vec()]).expect("Valid content")
    }

    /// Shape, labels and distances of the matrix.
    #[test]
    fn matrix() {
        let store = SeriesStore::univariate(
            &ndarray::array![
                [0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
                [0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
                [5.0, 4.0, 3.0, 2.0, 1.0, 0.0]
            ],
            &[2.0, 7.0, 7.0],
        )
        .expect("Valid store");
        let shapelets = [shapelet(&[1.0, 2.0, 3.0], 0), shapelet(&[3.0, 2.0, 1.0, 0.0], 0)];

        let features = transform(&shapelets, &store, DistanceKind::Direct).expect("Compatible");

        assert_eq!(features.dim(), (3, 3));
        assert_eq!(features.column(2).to_vec(), vec![2.0, 7.0, 7.0]);
        assert!(features.iter().all(|value| value.is_finite() && *value >= 0.0));
        approx::assert_relative_eq!(features[[1, 0]], 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(features[[2, 1]], 0.0, epsilon = 1e-12);
        assert!(features[[0, 0]] > 0.0);
        assert_eq!(z_normalize(&[1.0, 2.0, 3.0]), shapelets[0].content().expect("Content")[0]);
    }

    /// Shapelets that don't fit are rejected.
    #[test]
    fn incompatible() {
        let store = SeriesStore::univariate(&ndarray::array![[0.0, 1.0, 2.0]], &[0.0])
            .expect("Valid store");

        assert!(matches!(
            transform(&[shapelet(&[1.0, 2.0, 3.0, 4.0], 0)], &store, DistanceKind::Direct),
            Err(Error::IncompatibleShapelet { index: 0, length: 4, .. })
        ));
        assert!(matches!(
            transform(&[shapelet(&[1.0, 2.0], 1)], &store, DistanceKind::Direct),
            Err(Error::IncompatibleShapelet { dimension: 1, .. })
        ));
    }
}
