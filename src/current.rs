use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::db::Warehouse;
use crate::loader::{self, LoadSummary, SinkTable};
use crate::models::{JobRecord, parse_date, parse_id};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A loosely-typed JSON value from the job board, reduced to the shapes the
/// flattening rules care about. Numbers and booleans are kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub enum Nested {
    #[default]
    Absent,
    Text(String),
    Named(BTreeMap<String, Nested>),
    List(Vec<Nested>),
}

impl From<Value> for Nested {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Nested::Absent,
            Value::String(s) => Nested::Text(s),
            Value::Number(n) => Nested::Text(n.to_string()),
            Value::Bool(b) => Nested::Text(b.to_string()),
            Value::Array(items) => Nested::List(items.into_iter().map(Nested::from).collect()),
            Value::Object(map) => {
                Nested::Named(map.into_iter().map(|(k, v)| (k, Nested::from(v))).collect())
            }
        }
    }
}

impl Nested {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Nested::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn field(&self, key: &str) -> Option<&Nested> {
        match self {
            Nested::Named(map) => map.get(key),
            _ => None,
        }
    }

    /// Flatten a possibly-listed, possibly-structured field to one string.
    ///
    /// A non-empty list contributes only its first element: an object is
    /// drilled into along `path`, anything else is taken as text. A bare
    /// string is used directly. Everything else is `None`.
    pub fn first_name(&self, path: &[&str]) -> Option<String> {
        match self {
            Nested::List(items) => match items.first()? {
                first @ Nested::Named(_) => first.drill(path),
                other => other.as_text().map(str::to_string),
            },
            Nested::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Follow `path` through nested objects. Intermediate strings end the
    /// walk early and are returned as-is.
    fn drill(&self, path: &[&str]) -> Option<String> {
        let Some((key, rest)) = path.split_first() else {
            return self.as_text().map(str::to_string);
        };
        let next = self.field(key)?;
        if rest.is_empty() {
            return next.as_text().map(str::to_string);
        }
        match next {
            Nested::Named(_) => next.drill(rest),
            Nested::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardJob {
    #[serde(default)]
    pub id: Nested,
    #[serde(default)]
    pub internal_job_id: Nested,
    #[serde(default)]
    pub absolute_url: Nested,
    #[serde(default)]
    pub title: Nested,
    #[serde(default)]
    pub departments: Nested,
    #[serde(default)]
    pub offices: Nested,
    #[serde(default)]
    pub updated_at: Nested,
}

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Option<Vec<BoardJob>>,
}

/// Flatten one job-board entry into a sink row.
pub fn flatten_job(job: &BoardJob, company_name: &str) -> JobRecord {
    let text = |field: &Nested| field.as_text().map(str::to_string);

    JobRecord {
        job_id: job.id.as_text().and_then(parse_id),
        internal_job_id: job.internal_job_id.as_text().and_then(parse_id),
        absolute_url: text(&job.absolute_url),
        title: text(&job.title),
        department: job.departments.first_name(&["name"]),
        location: job.offices.first_name(&["location", "name"]),
        company_name: company_name.to_string(),
        open_date: job.updated_at.as_text().and_then(parse_date),
        close_date: None,
    }
}

pub struct BoardClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl BoardClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// One GET, no retries. Any non-2xx status is an error.
    pub fn fetch_jobs(&self) -> Result<Vec<BoardJob>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("Failed to send request to {}", self.url))?
            .error_for_status()
            .context("Job board request failed")?;

        let body: BoardResponse = response
            .json()
            .context("Failed to parse job board response")?;

        Ok(body.jobs.unwrap_or_default())
    }
}

/// Fetch current postings and load them into `zen_bronze.raw_current`.
///
/// Returns `None` without connecting when the board has no jobs.
pub fn run<W, F>(board: &BoardClient, company_name: &str, connect: F) -> Result<Option<LoadSummary>>
where
    W: Warehouse,
    F: FnOnce() -> Result<W>,
{
    let jobs = board.fetch_jobs()?;
    if jobs.is_empty() {
        debug!(url = %board.url, "job board returned no jobs");
        return Ok(None);
    }

    let records: Vec<JobRecord> = jobs.iter().map(|job| flatten_job(job, company_name)).collect();

    let mut wh = connect()?;
    let summary = loader::replace_contents(&mut wh, SinkTable::Current, &records)?;
    debug!(
        table = SinkTable::Current.qualified_name(),
        rows = summary.rows,
        "current load complete"
    );
    Ok(Some(summary))
}
