//! # Relatório de Validação
//!
//! Junta as falhas de carregamento (arquivo ilegível, limite excedido,
//! erro de sintaxe) e os erros da suíte em um único documento JSON.
//!
//! ```json
//! {
//!   "status": "invalid",
//!   "started_at": "2026-01-01T12:00:00+00:00",
//!   "finished_at": "2026-01-01T12:00:01+00:00",
//!   "files": 3,
//!   "tests": 2,
//!   "external_lookup_attempted": false,
//!   "errors": [
//!     {
//!       "code": "E2002",
//!       "category": "suite",
//!       "description": "Unresolved reference",
//!       "message": "...",
//!       "location": "a.rfml"
//!     }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{ErrorCode, StructuredError};
use crate::loader::LoadedSuite;
use crate::protocol::{TestDefinition, UploadKind};
use crate::validation::ValidationReport;

/// JSON indentado. Falhas viram `E5002`.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StructuredError> {
    serde_json::to_string_pretty(value).map_err(|err| {
        StructuredError::new(ErrorCode::SERIALIZATION_ERROR, format!("failed to serialize output: {}", err))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub status: SuiteStatus,
    pub started_at: String,
    pub finished_at: String,
    pub files: usize,
    pub tests: usize,
    pub external_lookup_attempted: bool,
    /// Falhas de carregamento primeiro, depois erros da suíte.
    pub errors: Vec<StructuredError>,
}

impl SuiteReport {
    pub fn build(
        suite: &LoadedSuite,
        validation: &ValidationReport,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let errors: Vec<StructuredError> = suite
            .failures
            .iter()
            .map(|failure| failure.to_structured())
            .chain(validation.errors.iter().map(|err| err.to_structured()))
            .collect();

        Self {
            status: if errors.is_empty() {
                SuiteStatus::Valid
            } else {
                SuiteStatus::Invalid
            },
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            files: suite.files(),
            tests: suite.definitions.len(),
            external_lookup_attempted: validation.external_lookup_attempted,
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == SuiteStatus::Valid
    }

    pub fn to_json(&self) -> Result<String, StructuredError> {
        to_pretty_json(self)
    }
}

// ============================================================================
// SAÍDA DO `parse`
// ============================================================================

/// Um arquivo de upload referenciado por um step.
#[derive(Debug, Clone, Serialize)]
pub struct StepUpload {
    pub step_index: usize,
    pub kind: UploadKind,
    pub path: String,
}

/// O teste normalizado mais os uploads que ele exige.
#[derive(Debug, Serialize)]
pub struct ParsedTest<'a> {
    #[serde(flatten)]
    pub test: &'a TestDefinition,
    pub uploadable_files: Vec<StepUpload>,
}

impl<'a> ParsedTest<'a> {
    pub fn new(test: &'a TestDefinition) -> Self {
        let uploadable_files = test
            .uploadable_files()
            .into_iter()
            .map(|(step_index, file)| StepUpload {
                step_index,
                kind: file.kind,
                path: file.path,
            })
            .collect();
        Self { test, uploadable_files }
    }

    pub fn to_json(&self) -> Result<String, StructuredError> {
        to_pretty_json(self)
    }
}
