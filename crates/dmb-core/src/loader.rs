//! CSV inventory loader.
//!
//! Malformed rows are skipped with a warning; only an unreadable source fails
//! the whole load.

use std::{fs::File, io::Read, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::{domain::DomainRecord, Error, Result};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    domain_name: String,
    #[serde(default, alias = "renewal_date")]
    expiration_date: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default, alias = "link")]
    management_link: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadReport {
    pub records: Vec<DomainRecord>,
    pub skipped: usize,
}

pub fn load_csv_path(path: &Path) -> Result<LoadReport> {
    let file = File::open(path)
        .map_err(|e| Error::Load(format!("{}: {e}", path.display())))?;
    let report = load_csv(file)?;
    tracing::info!(
        path = %path.display(),
        loaded = report.records.len(),
        skipped = report.skipped,
        "loaded domains"
    );
    Ok(report)
}

pub fn load_csv(reader: impl Read) -> Result<LoadReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| Error::Load(e.to_string()))?.clone();
    if !headers.iter().any(|h| h == "domain_name") {
        return Err(Error::Load("missing required column: domain_name".to_string()));
    }

    let mut report = LoadReport::default();
    for (idx, row) in rdr.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping malformed csv row");
                report.skipped += 1;
                continue;
            }
        };
        match row_to_record(row) {
            Ok(rec) => report.records.push(rec),
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping invalid csv row");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

fn row_to_record(row: CsvRow) -> Result<DomainRecord> {
    let name = row.domain_name.trim();
    if name.is_empty() {
        return Err(Error::InvalidRecord("empty domain_name".to_string()));
    }

    let expiration_date = match present(row.expiration_date) {
        Some(raw) => Some(parse_expiration_date(&raw).ok_or_else(|| {
            Error::InvalidRecord(format!("{name}: unparseable expiration_date {raw:?}"))
        })?),
        None => None,
    };

    Ok(DomainRecord {
        name: name.to_string(),
        expiration_date,
        provider: present(row.provider),
        management_link: present(row.management_link),
        status: present(row.status),
    })
}

/// Parse a date or timestamp, discarding time-of-day.
pub fn parse_expiration_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
