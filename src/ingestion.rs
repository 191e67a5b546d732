use std::io::{BufRead, Write};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::Location;
use crate::duration::sanitize_duration;
use crate::errors::{AppError, AppResult};

/// A job posting as exported by the scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub title: String,
    pub city: String,
    pub contract_type: String,
    #[serde(default)]
    pub contract_subtype: String,
    #[serde(default)]
    pub duration: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub submission_date: NaiveDate,
}

/// A job posting with its location resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRecord {
    pub title: String,
    pub city: String,
    pub department: String,
    pub region: String,
    pub contract_type: String,
    pub contract_subtype: String,
    pub duration: String,
    pub duration_months: Option<f64>,
    pub submission_date: NaiveDate,
}

impl ResolvedRecord {
    pub fn new(record: JobRecord, city: String, location: Location) -> Self {
        let duration_months = sanitize_duration(&record.duration).as_months();
        Self {
            title: record.title,
            city,
            department: location.department,
            region: location.region,
            contract_type: record.contract_type,
            contract_subtype: record.contract_subtype,
            duration: record.duration,
            duration_months,
            submission_date: record.submission_date,
        }
    }
}

/// Reads one JSON document per line, skipping blank lines.
pub fn read_records<R: BufRead>(reader: R) -> AppResult<Vec<JobRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str::<JobRecord>(&line)
            .map_err(|err| AppError::Parse(format!("line {}: {err}", index + 1)))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_records<W: Write>(mut writer: W, records: &[ResolvedRecord]) -> AppResult<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Extended {
        #[serde(rename = "$date")]
        date: ExtendedDate,
    },
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExtendedDate {
    Millis(i64),
    Text(String),
    Long {
        #[serde(rename = "$numberLong")]
        value: String,
    },
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawDate::deserialize(deserializer)?;
    let parsed = match raw {
        RawDate::Text(text) => parse_date_text(&text),
        RawDate::Extended { date } => match date {
            ExtendedDate::Millis(millis) => date_from_millis(millis),
            ExtendedDate::Text(text) => parse_date_text(&text),
            ExtendedDate::Long { value } => value.parse::<i64>().ok().and_then(date_from_millis),
        },
    };
    parsed.ok_or_else(|| serde::de::Error::custom("unrecognised submission_date"))
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::parse_from_str(text, "%d/%m/%Y").ok())
}

fn date_from_millis(millis: i64) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.date_naive())
}
