//! Shapelet logs rebuild the same transform without rediscovery.

mod common;

use std::{fs, path::PathBuf};

use approx::assert_relative_eq;
use shapelets::{ShapeletConfig, ShapeletTransform, discover, persist::LogCheckpoint};

/// Unique path in the temporary directory.
fn temp_log(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("shapelets-{}-{name}.csv", std::process::id()))
}

/// Saving and loading reproduces the feature matrix.
#[test]
fn log_round_trip() {
    let store = common::three_classes();
    let config = ShapeletConfig::new(6).with_length_range(3, 10);
    let path = temp_log("round-trip");

    let mut fitted = ShapeletTransform::new(config);
    let expected = fitted.fit_transform(&store).expect("Fit failed");
    fitted.save(&path).expect("Saving failed");

    let loaded = ShapeletTransform::load(config, &path).expect("Loading failed");
    let actual = loaded.transform(&store).expect("Transform failed");
    fs::remove_file(&path).expect("Removing log failed");

    assert_eq!(actual.dim(), expected.dim());
    for (actual, expected) in actual.iter().zip(&expected) {
        assert_relative_eq!(actual, expected, epsilon = 1e-9);
    }

    let header = "quality,seriesId,startPos,classValue,numChannels,dimension";
    let mut buffer = Vec::new();
    shapelets::persist::write_log(&mut buffer, fitted.shapelets().expect("Fitted"))
        .expect("Writing failed");
    assert!(String::from_utf8(buffer).expect("Valid UTF-8").starts_with(header));
}

/// The checkpoint log holds the best shapelets of the last visited series.
#[test]
fn checkpoint_log() {
    let store = common::three_classes();
    let config = ShapeletConfig::new(4).with_length_range(3, 8);
    let path = temp_log("checkpoint");

    let mut sink = LogCheckpoint::new(&path);
    let discovery = discover(&store, &config, &mut sink).expect("Discovery failed");
    let checkpointed = shapelets::persist::load(sink.path()).expect("Loading failed");
    fs::remove_file(&path).expect("Removing log failed");

    // The sibling file was renamed over the log
    let mut temporary = path.clone().into_os_string();
    temporary.push(".tmp");
    assert!(!PathBuf::from(temporary).exists(), "Temporary log left behind");

    assert_eq!(checkpointed.len(), discovery.shapelets.len());
    for (checkpointed, discovered) in checkpointed.iter().zip(&discovery.shapelets) {
        assert_eq!(checkpointed.series_id(), discovered.series_id());
        assert_eq!(checkpointed.start(), discovered.start());
        assert_eq!(checkpointed.length(), discovered.length());
        assert_eq!(checkpointed.quality(), discovered.quality());
    }
}
