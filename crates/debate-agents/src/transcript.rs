use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use debate_models::schema::DATE_FORMAT;
use debate_models::DebateKey;
use tracing::info;

use crate::error::RunError;
use crate::runner::DayReport;

/// `{date}_{ticker}_{model}_{version}.json`
pub fn transcript_file_name(date: NaiveDate, key: &DebateKey) -> String {
    format!("{}_{}.json", date.format(DATE_FORMAT), key)
}

/// Write a day's report as pretty JSON into `dir`, creating it if needed.
pub fn write_transcript(dir: &Path, report: &DayReport) -> Result<PathBuf, RunError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(transcript_file_name(report.date, &report.key));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    info!(path = %path.display(), "Wrote transcript");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_matches_track() {
        let key = DebateKey::new("NVDA", "GPT4", "V1");
        let date = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
        assert_eq!(transcript_file_name(date, &key), "2024-03-28_NVDA_GPT4_V1.json");
    }
}
