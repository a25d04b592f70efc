//! Output types: the extracted record, per-field outcomes, and the run report.
//!
//! [`ExtractedRecord`] serialises 1:1 onto the analytical table's fixed
//! schema (its serde field names are the column names), so the sink can
//! post it without a separate mapping layer. [`RunOutput`] is how stage
//! failures reach the caller: the orchestrator's `run` entry point never
//! raises for a failed stage, it reports the outcome here.

use crate::error::CompletionError;
use crate::state::Stage;
use serde::{Deserialize, Serialize};

/// The eight semantic fields extracted from a paper.
///
/// Each maps to exactly one fixed natural-language query template (see
/// [`crate::prompts`]) and one column of the sink schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionField {
    Title,
    Authors,
    PublicationDate,
    Abstract,
    KeyFindings,
    Methodology,
    Summary,
    Keywords,
}

impl ExtractionField {
    /// All fields, in the order they are queried and stored.
    pub const ALL: [ExtractionField; 8] = [
        ExtractionField::Title,
        ExtractionField::Authors,
        ExtractionField::PublicationDate,
        ExtractionField::Abstract,
        ExtractionField::KeyFindings,
        ExtractionField::Methodology,
        ExtractionField::Summary,
        ExtractionField::Keywords,
    ];

    /// The sink column this field is stored under.
    pub fn column(self) -> &'static str {
        match self {
            ExtractionField::Title => "title",
            ExtractionField::Authors => "authors",
            ExtractionField::PublicationDate => "publication_date",
            ExtractionField::Abstract => "abstract",
            ExtractionField::KeyFindings => "findings",
            ExtractionField::Methodology => "methodology",
            ExtractionField::Summary => "summary",
            ExtractionField::Keywords => "keywords",
        }
    }
}

impl std::fmt::Display for ExtractionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// One row of the analytical table.
///
/// Created once per run by the extract stage, consumed read-only by the
/// store stage, never mutated. `keywords` is the schema's repeated string
/// column; all other values are plain strings taken verbatim from the
/// model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Record creation time, UTC, formatted `YYYY/MM/DD HH:MM:SS`.
    pub utc_timestamp: String,
    pub title: String,
    pub authors: String,
    pub publication_date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub findings: String,
    pub methodology: String,
    pub summary: String,
    pub keywords: Vec<String>,
}

impl ExtractedRecord {
    /// The stored value for a field, for report/inspection purposes.
    /// Keywords are re-joined with `", "`.
    pub fn value_of(&self, field: ExtractionField) -> String {
        match field {
            ExtractionField::Title => self.title.clone(),
            ExtractionField::Authors => self.authors.clone(),
            ExtractionField::PublicationDate => self.publication_date.clone(),
            ExtractionField::Abstract => self.abstract_text.clone(),
            ExtractionField::KeyFindings => self.findings.clone(),
            ExtractionField::Methodology => self.methodology.clone(),
            ExtractionField::Summary => self.summary.clone(),
            ExtractionField::Keywords => self.keywords.join(", "),
        }
    }
}

/// The result of querying one field.
///
/// A failed query does not abort the run: `degraded` is set and `value`
/// holds the error-description string that was written into the record.
#[derive(Debug, Clone, Serialize)]
pub struct FieldOutcome {
    pub field: ExtractionField,
    /// Model output, verbatim — or the error-description string when degraded.
    pub value: String,
    /// Set when the completion call failed and the field was degraded.
    pub degraded: bool,
    /// Wall-clock duration of the completion call.
    pub duration_ms: u64,
    #[serde(skip)]
    pub error: Option<CompletionError>,
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StageStatus {
    /// The stage ran and produced its output.
    Completed,
    /// The stage ran and failed; the error text was logged.
    Failed(String),
}

/// Report for one executed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub duration_ms: u64,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

/// Aggregate timing and quality counters for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total_duration_ms: u64,
    pub ingest_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub store_duration_ms: u64,
    /// Fields whose value is an error-description string.
    pub degraded_fields: usize,
}

/// Everything a caller can observe about a finished (or resumed) run.
///
/// The reference behaviour deliberately reports stage failures here instead
/// of raising: a run that reached End with a failed store stage is still a
/// "completed" run, and `stages` carries the failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    /// The assembled record, when the extract stage completed. Present even
    /// if the store stage later failed.
    pub record: Option<ExtractedRecord>,
    /// Per-field query outcomes, in field order.
    pub fields: Vec<FieldOutcome>,
    /// One report per stage executed in this invocation.
    pub stages: Vec<StageReport>,
    pub stats: RunStats,
}

impl RunOutput {
    /// Whether every executed stage completed without failure.
    pub fn all_stages_succeeded(&self) -> bool {
        self.stages.iter().all(StageReport::succeeded)
    }

    /// The report for `stage`, if it was executed in this invocation.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ExtractedRecord {
        ExtractedRecord {
            utc_timestamp: "2025/01/15 10:30:00".into(),
            title: "Attention Is All You Need".into(),
            authors: "Vaswani et al.".into(),
            publication_date: "2017/06/12".into(),
            abstract_text: "We propose the Transformer.".into(),
            findings: "Attention suffices.".into(),
            methodology: "Ablations on WMT 2014.".into(),
            summary: "A new architecture.".into(),
            keywords: vec!["attention".into(), "transformer".into()],
        }
    }

    #[test]
    fn record_serialises_to_schema_column_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        for column in [
            "utc_timestamp",
            "title",
            "authors",
            "publication_date",
            "abstract",
            "findings",
            "methodology",
            "summary",
            "keywords",
        ] {
            assert!(json.get(column).is_some(), "missing column {column}");
        }
        assert!(json["keywords"].is_array());
    }

    #[test]
    fn field_order_matches_schema_order() {
        let columns: Vec<&str> = ExtractionField::ALL.iter().map(|f| f.column()).collect();
        assert_eq!(
            columns,
            vec![
                "title",
                "authors",
                "publication_date",
                "abstract",
                "findings",
                "methodology",
                "summary",
                "keywords",
            ]
        );
    }

    #[test]
    fn value_of_rejoins_keywords() {
        let record = sample_record();
        assert_eq!(
            record.value_of(ExtractionField::Keywords),
            "attention, transformer"
        );
        assert_eq!(
            record.value_of(ExtractionField::Title),
            "Attention Is All You Need"
        );
    }

    #[test]
    fn run_output_stage_lookup() {
        let output = RunOutput {
            run_id: "r".into(),
            stages: vec![
                StageReport {
                    stage: Stage::Ingest,
                    status: StageStatus::Completed,
                    duration_ms: 3,
                },
                StageReport {
                    stage: Stage::Extract,
                    status: StageStatus::Failed("no document text".into()),
                    duration_ms: 0,
                },
            ],
            ..Default::default()
        };
        assert!(!output.all_stages_succeeded());
        assert!(output.stage(Stage::Ingest).unwrap().succeeded());
        assert!(!output.stage(Stage::Extract).unwrap().succeeded());
        assert!(output.stage(Stage::Store).is_none());
    }
}
