//! Pruning never changes the outcome of discovery.

use ndarray::Array2;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use shapelets::{
    OrderlineEntry, PRUNING_SLACK, QualityBound, QualityMeasure, SeriesStore, ShapeletConfig,
    discover,
};

/// Corpus with `num_classes` classes assigned in turn.
fn corpus_strategy() -> impl Strategy<Value = SeriesStore> {
    (6_usize..10, 10_usize..14, 2_usize..4).prop_flat_map(|(num_series, length, num_classes)| {
        prop::collection::vec(-5.0_f64..5.0, num_series * length).prop_map(move |values| {
            let labels = (0..num_series)
                .map(|series| (series % num_classes) as f64)
                .collect::<Vec<_>>();
            let values =
                Array2::from_shape_vec((num_series, length), values).expect("Matching shape");

            SeriesStore::univariate(&values, &labels).expect("Valid store")
        })
    })
}

/// Orderline with a random prefix length.
fn orderline_strategy() -> impl Strategy<Value = (Vec<OrderlineEntry>, usize, usize)> {
    (2_usize..5).prop_flat_map(|num_classes| {
        prop::collection::vec((0.0_f64..10.0, 0..num_classes), 2..24).prop_flat_map(
            move |entries| {
                let len = entries.len();
                let entries = entries
                    .into_iter()
                    .map(|(distance, class_id)| OrderlineEntry { distance, class_id })
                    .collect::<Vec<_>>();

                (Just(entries), 0..=len, Just(num_classes))
            },
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// Pruned and unpruned runs keep exactly the same shapelets.
    #[test]
    fn pruning_is_sound(
        store in corpus_strategy(),
        num_shapelets in 1_usize..5,
        start_percentage in 0_u8..60,
        binary_class_value in any::<bool>(),
        round_robin in any::<bool>(),
    ) {
        let config = ShapeletConfig::new(num_shapelets)
            .with_length_range(3, 6)
            .with_binary_class_value(binary_class_value)
            .with_round_robin(round_robin);

        let unpruned = discover(&store, &config, &mut ()).expect("Discovery failed");
        let pruned = discover(&store, &config.with_candidate_pruning(true, start_percentage), &mut ())
            .expect("Discovery failed");

        prop_assert_eq!(&pruned.shapelets, &unpruned.shapelets);
        prop_assert_eq!(
            pruned.stats.candidates_evaluated + pruned.stats.candidates_pruned,
            unpruned.stats.candidates_evaluated
        );
    }

    /// The bound of any prefix is at least the final information gain.
    #[test]
    fn bound_covers_final_quality((entries, seen, num_classes) in orderline_strategy()) {
        let mut totals = vec![0; num_classes];
        for entry in &entries {
            totals[entry.class_id] += 1;
        }

        let mut bound = QualityBound::new(QualityMeasure::InformationGain, &totals);
        for entry in &entries[..seen] {
            bound.push(*entry);
        }
        let upper = bound.upper_bound();

        let mut complete = entries.clone();
        let quality = QualityMeasure::InformationGain.score(&mut complete, num_classes).quality;

        prop_assert!(upper + PRUNING_SLACK >= quality, "bound {} below quality {}", upper, quality);

        // Seeing more never loosens the bound
        for entry in &entries[seen..] {
            bound.push(*entry);
            prop_assert!(bound.upper_bound() <= upper + PRUNING_SLACK);
        }
    }
}
