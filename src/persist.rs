//! Shapelet log format.
//!
//! A header line `quality,seriesId,startPos,classValue,numChannels,dimension`,
//! then for every shapelet a line with those six fields followed by
//! `numChannels` lines of comma separated content values.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use tracing::{debug, info, instrument};

use crate::{Error, Shapelet, discover::CheckpointSink, select::BestK};

/// Fields of the header line.
pub const HEADER: [&str; 6] = [
    "quality",
    "seriesId",
    "startPos",
    "classValue",
    "numChannels",
    "dimension",
];

/// Write shapelets with their content.
///
/// # Errors
///
/// - When a shapelet has no content.
/// - When writing fails.
pub fn write_log<'a>(
    writer: impl Write,
    shapelets: impl IntoIterator<Item = &'a Shapelet>,
) -> Result<(), Error> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);
    writer.write_record(HEADER)?;

    for (index, shapelet) in shapelets.into_iter().enumerate() {
        let content = shapelet.content().ok_or(Error::MissingContent(index))?;

        writer.write_record([
            shapelet.quality().to_string(),
            shapelet.series_id().to_string(),
            shapelet.start().to_string(),
            shapelet.class_value().to_string(),
            content.len().to_string(),
            shapelet.dimension().to_string(),
        ])?;
        for channel in content {
            writer.write_record(channel.iter().map(f64::to_string))?;
        }
    }

    writer.flush().map_err(csv::Error::from)?;

    Ok(())
}

/// Read shapelets, re-normalizing their content.
///
/// A trailing comma on a line is tolerated.
///
/// # Errors
///
/// - When the input is not valid CSV or doesn't describe valid shapelets.
pub fn read_log(reader: impl Read) -> Result<Vec<Shapelet>, Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut records = reader.records();

    let header = records.next().transpose()?.ok_or(Error::MalformedLog {
        record: 0,
        reason: "missing header",
    })?;
    if fields(&header).ne(HEADER) {
        return Err(Error::MalformedLog {
            record: 0,
            reason: "unexpected header",
        });
    }

    let mut shapelets = Vec::new();
    let mut record_number = 0;
    while let Some(record) = records.next().transpose()? {
        record_number += 1;
        let shapelet_record = record_number;
        let malformed = move |reason| Error::MalformedLog {
            record: shapelet_record,
            reason,
        };

        let values = fields(&record).collect::<Vec<_>>();
        let [quality, series_id, start, class_value, num_channels, dimension] = values[..] else {
            return Err(malformed("expected six shapelet fields"));
        };
        let quality = quality.parse::<f64>().map_err(|_| malformed("invalid quality"))?;
        let series_id = series_id.parse::<usize>().map_err(|_| malformed("invalid series id"))?;
        let start = start.parse::<usize>().map_err(|_| malformed("invalid start position"))?;
        let class_value = class_value
            .parse::<f64>()
            .map_err(|_| malformed("invalid class value"))?;
        let num_channels = num_channels
            .parse::<usize>()
            .map_err(|_| malformed("invalid channel count"))?;
        let dimension = dimension.parse::<usize>().map_err(|_| malformed("invalid dimension"))?;

        // The channel count is untrusted, grow with the lines actually read
        let mut content = Vec::new();
        for _ in 0..num_channels {
            let channel = records
                .next()
                .transpose()?
                .ok_or_else(|| malformed("missing content line"))?;
            record_number += 1;

            content.push(
                fields(&channel)
                    .map(str::parse::<f64>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| Error::MalformedLog {
                        record: record_number,
                        reason: "invalid content value",
                    })?,
            );
        }

        let shapelet =
            Shapelet::from_content(quality, series_id, start, dimension, class_value, content)
                .map_err(|_| Error::MalformedLog {
                    record: record_number,
                    reason: "invalid content",
                })?;
        shapelets.push(shapelet);
    }

    debug!(shapelets = shapelets.len(), "Read shapelet log");

    Ok(shapelets)
}

/// Fields of a record without the empty field of a trailing comma.
fn fields(record: &StringRecord) -> impl Iterator<Item = &str> {
    let len = record.len();

    record
        .iter()
        .enumerate()
        .filter(move |(index, field)| !(index + 1 == len && field.is_empty() && len > 1))
        .map(|(_, field)| field)
}

/// Write shapelets to a file.
///
/// # Errors
///
/// - When the file can't be created or written.
/// - When a shapelet has no content.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save<'a>(
    path: impl AsRef<Path>,
    shapelets: impl IntoIterator<Item = &'a Shapelet>,
) -> Result<(), Error> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    write_log(BufWriter::new(file), shapelets)?;
    info!("Saved shapelet log");

    Ok(())
}

/// Read shapelets from a file.
///
/// # Errors
///
/// - When the file can't be opened or is not a valid log.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Shapelet>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    read_log(BufReader::new(file))
}

/// Checkpoint sink that replaces a log file after every visited series.
///
/// The log is written next to the target with a `.tmp` suffix first and then
/// renamed over it, an interrupted write leaves the previous log intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCheckpoint {
    /// File to replace.
    path: PathBuf,
    /// Sibling file that is written first.
    temporary: PathBuf,
}

impl LogCheckpoint {
    /// Replace `path` on every checkpoint.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut temporary = OsString::from(path.as_os_str());
        temporary.push(".tmp");

        Self {
            path,
            temporary: PathBuf::from(temporary),
        }
    }

    /// File that is replaced.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointSink for LogCheckpoint {
    fn checkpoint(&mut self, series_visited: usize, best: &BestK) -> Result<(), Error> {
        debug!(series_visited, path = %self.path.display(), "Checkpoint");

        save(&self.temporary, best.iter())?;
        fs::rename(&self.temporary, &self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}
