use std::io::Write;

use itertools::Itertools;
use thiserror::Error;

use crate::models::{timestamp, AttemptResponse};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub const HEADER: [&str; 9] = [
    "id",
    "task_id",
    "standard_id",
    "started_at",
    "ended_at",
    "time_seconds",
    "score",
    "proficiency",
    "errors",
];

/// Write attempt history as CSV, one row per attempt, oldest first.
pub fn write_attempts<W: Write>(out: W, attempts: &[AttemptResponse]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for attempt in attempts.iter().sorted_by_key(|a| a.started_at) {
        writer.write_record([
            attempt.id.to_string(),
            attempt.task_id.to_string(),
            attempt.standard_id.to_string(),
            timestamp::format(&attempt.started_at),
            timestamp::format(&attempt.ended_at),
            attempt.time_seconds.to_string(),
            attempt.score.to_string(),
            attempt.proficiency.to_string(),
            attempt.errors.iter().map(|e| e.name.as_str()).join(";"),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
