//! Storage: forward the assembled record to the analytical sink.
//!
//! ## The sink seam
//!
//! The pipeline only needs two operations from storage: idempotent
//! create-if-absent of the destination table, and a row insert.
//! [`RecordSink`] is that seam. [`BigQuerySink`] speaks the BigQuery v2
//! REST endpoints over `reqwest`; [`MemorySink`] collects rows in memory
//! for tests and dry runs.
//!
//! There is no dedup key in the schema — insert idempotence is the
//! caller's problem (re-driving a run inserts a second row with a fresh
//! timestamp). There is also no retry: a failed insert is logged by the
//! orchestrator and the run ends.

use crate::error::SinkError;
use crate::output::ExtractedRecord;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use tracing::{debug, info};

/// The analytical-table storage capability.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Create the destination table if it does not exist. Idempotent.
    async fn ensure_table(&self) -> Result<(), SinkError>;

    /// Insert one record as a table row.
    async fn insert(&self, record: &ExtractedRecord) -> Result<(), SinkError>;
}

/// Fixed schema of the destination table, as BigQuery field descriptors.
fn table_schema() -> serde_json::Value {
    json!([
        { "name": "utc_timestamp",    "type": "TIMESTAMP" },
        { "name": "title",            "type": "STRING" },
        { "name": "authors",          "type": "STRING" },
        { "name": "publication_date", "type": "STRING" },
        { "name": "abstract",         "type": "STRING" },
        { "name": "findings",         "type": "STRING" },
        { "name": "methodology",      "type": "STRING" },
        { "name": "summary",          "type": "STRING" },
        { "name": "keywords",         "type": "STRING", "mode": "REPEATED" },
    ])
}

/// Sink backed by the BigQuery v2 REST API.
///
/// Credentials are opaque to the pipeline: the caller supplies a bearer
/// token (typically minted via `gcloud auth print-access-token` or a
/// service-account flow) and the project/dataset/table coordinates.
pub struct BigQuerySink {
    client: reqwest::Client,
    api_base: String,
    project_id: String,
    dataset_id: String,
    table_id: String,
    token: String,
}

impl BigQuerySink {
    pub const DEFAULT_API_BASE: &'static str = "https://bigquery.googleapis.com/bigquery/v2";

    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
            token: token.into(),
        }
    }

    /// Override the API base URL (emulators, test doubles).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn tables_url(&self) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables",
            self.api_base, self.project_id, self.dataset_id
        )
    }

    fn insert_url(&self) -> String {
        format!("{}/{}/insertAll", self.tables_url(), self.table_id)
    }
}

#[async_trait]
impl RecordSink for BigQuerySink {
    async fn ensure_table(&self) -> Result<(), SinkError> {
        let body = json!({
            "tableReference": {
                "projectId": self.project_id,
                "datasetId": self.dataset_id,
                "tableId": self.table_id,
            },
            "schema": { "fields": table_schema() },
        });

        let response = self
            .client
            .post(self.tables_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        // 409 Conflict means the table already exists — create-if-absent.
        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            debug!("Table '{}' present", self.table_id);
            return Ok(());
        }

        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        Err(SinkError::TableCreate {
            table: self.table_id.clone(),
            detail: format!("HTTP {status}: {detail}"),
        })
    }

    async fn insert(&self, record: &ExtractedRecord) -> Result<(), SinkError> {
        let body = json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "rows": [ { "json": record } ],
        });

        let response = self
            .client
            .post(self.insert_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SinkError::Insert {
                table: self.table_id.clone(),
                detail: format!("HTTP {status}: {detail}"),
            });
        }

        // insertAll returns 200 even for per-row failures; they arrive in
        // the body as insertErrors.
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        if let Some(errors) = payload.get("insertErrors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(SinkError::Insert {
                    table: self.table_id.clone(),
                    detail: serde_json::to_string(errors).unwrap_or_default(),
                });
            }
        }

        info!("Inserted record into '{}.{}'", self.dataset_id, self.table_id);
        Ok(())
    }
}

/// In-memory sink for tests and `--dry-run`.
///
/// Optionally scripted to fail on insert so orchestrator error handling
/// can be exercised without a network.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<ExtractedRecord>>,
    fail_with: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `insert` always fails with the given detail.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail_with: Some(detail.into()),
        }
    }

    /// Rows inserted so far.
    pub fn rows(&self) -> Vec<ExtractedRecord> {
        self.rows.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn ensure_table(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn insert(&self, record: &ExtractedRecord) -> Result<(), SinkError> {
        if let Some(detail) = &self.fail_with {
            return Err(SinkError::Insert {
                table: "memory".into(),
                detail: detail.clone(),
            });
        }
        self.rows
            .lock()
            .expect("sink lock poisoned")
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ExtractedRecord {
        ExtractedRecord {
            utc_timestamp: "2025/01/15 10:30:00".into(),
            title: "T".into(),
            authors: "A".into(),
            publication_date: "2024/12/01".into(),
            abstract_text: "Ab".into(),
            findings: "F".into(),
            methodology: "M".into(),
            summary: "S".into(),
            keywords: vec!["k1".into(), "k2".into()],
        }
    }

    #[test]
    fn schema_covers_all_columns_with_repeated_keywords() {
        let schema = table_schema();
        let fields = schema.as_array().unwrap();
        assert_eq!(fields.len(), 9);
        let keywords = fields.iter().find(|f| f["name"] == "keywords").unwrap();
        assert_eq!(keywords["mode"], "REPEATED");
        let ts = fields.iter().find(|f| f["name"] == "utc_timestamp").unwrap();
        assert_eq!(ts["type"], "TIMESTAMP");
    }

    #[test]
    fn bigquery_urls() {
        let sink = BigQuerySink::new("proj", "ds", "papers", "tok")
            .with_api_base("http://localhost:9050/bigquery/v2");
        assert_eq!(
            sink.tables_url(),
            "http://localhost:9050/bigquery/v2/projects/proj/datasets/ds/tables"
        );
        assert_eq!(
            sink.insert_url(),
            "http://localhost:9050/bigquery/v2/projects/proj/datasets/ds/tables/papers/insertAll"
        );
    }

    #[tokio::test]
    async fn memory_sink_collects_rows() {
        let sink = MemorySink::new();
        sink.ensure_table().await.unwrap();
        sink.insert(&sample_record()).await.unwrap();
        sink.insert(&sample_record()).await.unwrap();
        assert_eq!(sink.rows().len(), 2);
        assert_eq!(sink.rows()[0].title, "T");
    }

    #[tokio::test]
    async fn failing_memory_sink_rejects_insert() {
        let sink = MemorySink::failing("disk on fire");
        let err = sink.insert(&sample_record()).await.unwrap_err();
        assert!(matches!(err, SinkError::Insert { .. }));
        assert!(err.to_string().contains("disk on fire"));
        assert!(sink.rows().is_empty());
    }
}
