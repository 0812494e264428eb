//! ResultResolver — maps a final number to a roster record
//!
//! Lookups are fire-and-forget from the coordinator's point of view: a
//! completed session is handed to the resolver once, and whatever comes
//! back (match, no match, error, timeout) is display-only.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, WheelError};

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "NUMERO")]
    pub number: u64,
    #[serde(alias = "ESTUDIANTE")]
    pub name: String,
    /// Program / cohort label
    #[serde(default, alias = "PROG_Y_SEM")]
    pub program: String,
}

impl Record {
    pub fn new(number: u64, name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            program: program.into(),
        }
    }
}

/// Keyed lookup of a final number
#[async_trait]
pub trait ResultResolver: Send + Sync {
    /// `Ok(None)` when nothing matches
    async fn resolve(&self, number: u64) -> Result<Option<Record>, ResolveError>;

    /// Short label for logs
    fn name(&self) -> &str {
        "resolver"
    }
}

/// Lookup disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl ResultResolver for NoopResolver {
    async fn resolve(&self, _number: u64) -> Result<Option<Record>, ResolveError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROSTER FILE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory roster keyed by number
#[derive(Debug, Clone, Default)]
pub struct RosterResolver {
    records: HashMap<u64, Record>,
}

impl RosterResolver {
    /// Build from records. Later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut map = HashMap::new();
        for record in records {
            if let Some(previous) = map.insert(record.number, record) {
                log::warn!("[Resolver] duplicate roster number {}", previous.number);
            }
        }
        Self { records: map }
    }

    /// Load a `.json`, `.yaml` or `.yml` array of records
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(WheelError::from)?;
        let records: Vec<Record> = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text).map_err(WheelError::from)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&text).map_err(WheelError::from)?,
            other => {
                return Err(WheelError::UnsupportedFormat(other.unwrap_or("<none>").to_string()).into());
            }
        };
        log::info!("[Resolver] loaded {} roster records from {}", records.len(), path.display());
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, number: u64) -> Option<&Record> {
        self.records.get(&number)
    }
}

#[async_trait]
impl ResultResolver for RosterResolver {
    async fn resolve(&self, number: u64) -> Result<Option<Record>, ResolveError> {
        Ok(self.records.get(&number).cloned())
    }

    fn name(&self) -> &str {
        "roster"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REST TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Keyed lookup against a REST table endpoint
/// (`GET {base_url}/{table}?{column}=eq.{number}`)
#[derive(Debug, Clone)]
pub struct RestResolver {
    client: reqwest::Client,
    base_url: String,
    table: String,
    column: String,
    api_key: Option<String>,
}

impl RestResolver {
    pub fn new(base_url: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: table.into(),
            column: "NUMERO".into(),
            api_key: None,
        }
    }

    /// Builder: key column
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Builder: `apikey` header (also sent as bearer token)
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builder: per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ResolveError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Request URL for a number
    pub fn url_for(&self, number: u64) -> String {
        format!(
            "{}/{}?{}=eq.{}&limit=1",
            self.base_url, self.table, self.column, number
        )
    }
}

#[async_trait]
impl ResultResolver for RestResolver {
    async fn resolve(&self, number: u64) -> Result<Option<Record>, ResolveError> {
        let mut request = self.client.get(self.url_for(number));
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Unavailable(format!("HTTP {}", status)));
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| ResolveError::Malformed(e.to_string())),
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "rest"
    }
}
