//! # Módulo de Carregamento - Leitura de Arquivos RFML
//!
//! Este módulo é responsável por **ler e parsear** arquivos RFML do disco.
//!
//! ## O que este módulo faz?
//!
//! 1. Lê cada arquivo (vários em paralelo, limitado por um semáforo)
//! 2. Aplica os limites de tamanho e de steps
//! 3. Parseia o conteúdo para `TestDefinition`
//! 4. Devolve tudo **ordenado por caminho**
//!
//! A ordem de término das leituras varia entre execuções; a ordem do
//! resultado não. O validador depende disso para escolher o arquivo
//! canônico de um id duplicado.
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! let suite = load_suite(&paths, &ParseOptions::default(), &SuiteLimits::default()).await;
//! let report = validate_suite(&suite.definitions, None);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{ErrorCode, StructuredError};
use crate::limits::{validate_limits, LimitViolation, SuiteLimits};
use crate::parser::{parse_with_location, recover_identity, ParseOptions, SyntaxError};
use crate::protocol::{ExternalTest, TestDefinition};

/// Extensão esperada dos arquivos de teste.
pub const RFML_EXTENSION: &str = "rfml";

// ============================================================================
// ERROS
// ============================================================================

/// Falha ao carregar um arquivo. Sempre carrega o caminho.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{path}: file not found")]
    NotFound { path: String },

    #[error("{path}: failed to read file: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {}", join_messages(.violations))]
    LimitExceeded {
        path: String,
        violations: Vec<LimitViolation>,
    },

    /// `identity` é o `#!` do arquivo quando ainda dá para lê-lo.
    #[error("{path}: {source}")]
    Syntax {
        path: String,
        #[source]
        source: SyntaxError,
        identity: Option<String>,
    },

    /// Task do loader abortou (panic). Não há caminho associado.
    #[error("loader task failed: {message}")]
    Internal { message: String },
}

fn join_messages(violations: &[LimitViolation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        let path = path.display().to_string();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::LimitExceeded { path, .. }
            | Self::Syntax { path, .. } => Some(path.as_str()),
            Self::Internal { .. } => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::FILE_NOT_FOUND,
            Self::Io { .. } => ErrorCode::FILE_READ_ERROR,
            Self::LimitExceeded { .. } => ErrorCode::LIMIT_EXCEEDED,
            Self::Syntax { source, .. } => source.kind.code(),
            Self::Internal { .. } => ErrorCode::INTERNAL_ERROR,
        }
    }

    pub fn to_structured(&self) -> StructuredError {
        match self {
            Self::Syntax { path, source, .. } => source.to_structured(path),
            Self::NotFound { path } => StructuredError::new(self.code(), "file not found").with_location(path),
            Self::Io { path, source } => {
                StructuredError::new(self.code(), format!("failed to read file: {}", source)).with_location(path)
            }
            Self::LimitExceeded { path, violations } => {
                StructuredError::new(self.code(), join_messages(violations)).with_location(path)
            }
            Self::Internal { .. } => StructuredError::new(self.code(), self.to_string()),
        }
    }

    /// Id de um arquivo que existe mas não parseou.
    pub fn recovered_identity(&self) -> Option<&str> {
        match self {
            Self::Syntax { identity, .. } => identity.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// RESULTADO
// ============================================================================

/// Suíte carregada: testes válidos e falhas, ambos ordenados por caminho.
#[derive(Debug, Default)]
pub struct LoadedSuite {
    pub definitions: Vec<TestDefinition>,
    pub failures: Vec<LoadError>,
}

impl LoadedSuite {
    pub fn files(&self) -> usize {
        self.definitions.len() + self.failures.len()
    }

    /// Ids declarados por arquivos com erro de sintaxe.
    pub fn unloaded_ids(&self) -> Vec<&str> {
        self.failures.iter().filter_map(LoadError::recovered_identity).collect()
    }
}

// ============================================================================
// CARREGAMENTO
// ============================================================================

/// Carrega um único arquivo de forma síncrona.
pub fn load_file(path: &Path, options: &ParseOptions, limits: &SuiteLimits) -> Result<TestDefinition, LoadError> {
    let metadata = std::fs::metadata(path).map_err(|e| LoadError::io(path, e))?;
    check_size(path, metadata.len(), limits)?;

    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    parse_checked(path, &bytes, options, limits)
}

async fn load_file_async(
    path: &Path,
    options: &ParseOptions,
    limits: &SuiteLimits,
) -> Result<TestDefinition, LoadError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| LoadError::io(path, e))?;
    check_size(path, metadata.len(), limits)?;

    let bytes = tokio::fs::read(path).await.map_err(|e| LoadError::io(path, e))?;
    parse_checked(path, &bytes, options, limits)
}

fn check_size(path: &Path, len: u64, limits: &SuiteLimits) -> Result<(), LoadError> {
    let check = validate_limits(len, None, limits);
    if check.passed {
        Ok(())
    } else {
        Err(LoadError::LimitExceeded {
            path: path.display().to_string(),
            violations: check.violations,
        })
    }
}

fn parse_checked(
    path: &Path,
    bytes: &[u8],
    options: &ParseOptions,
    limits: &SuiteLimits,
) -> Result<TestDefinition, LoadError> {
    let location = path.display().to_string();

    let test = match parse_with_location(bytes, &location, options) {
        Ok(test) => test,
        Err(source) => {
            return Err(LoadError::Syntax {
                path: location,
                source,
                identity: recover_identity(bytes),
            })
        }
    };

    let check = validate_limits(bytes.len() as u64, Some(test.steps.len()), limits);
    if !check.passed {
        return Err(LoadError::LimitExceeded {
            path: location,
            violations: check.violations,
        });
    }

    Ok(test)
}

/// Lê e parseia todos os arquivos em paralelo.
///
/// - No máximo `limits.max_parallel_reads` arquivos ao mesmo tempo
/// - Caminhos repetidos são lidos uma vez só
/// - Arquivos sem extensão `.rfml` geram um aviso mas são parseados
/// - O resultado é ordenado por caminho, independente da ordem de término
#[instrument(skip_all, fields(files = paths.len()))]
pub async fn load_suite(paths: &[PathBuf], options: &ParseOptions, limits: &SuiteLimits) -> LoadedSuite {
    let mut unique: Vec<PathBuf> = paths.to_vec();
    unique.sort();
    unique.dedup();

    let semaphore = Arc::new(Semaphore::new(limits.max_parallel_reads.max(1)));
    let mut join_set = JoinSet::new();

    for path in unique {
        if path.extension().and_then(|ext| ext.to_str()) != Some(RFML_EXTENSION) {
            warn!(path = %path.display(), "File does not have the .rfml extension");
        }

        let semaphore = Arc::clone(&semaphore);
        let options = *options;
        let limits = limits.clone();

        join_set.spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire().await.ok();
            let result = load_file_async(&path, &options, &limits).await;
            (path, result)
        });
    }

    let mut loaded: Vec<(PathBuf, Result<TestDefinition, LoadError>)> = Vec::new();
    let mut internal = Vec::new();

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(entry) => loaded.push(entry),
            Err(err) => {
                error!(error = %err, "Loader task failed");
                internal.push(LoadError::Internal {
                    message: err.to_string(),
                });
            }
        }
    }

    loaded.sort_by(|a, b| a.0.cmp(&b.0));

    let mut suite = LoadedSuite::default();
    for (path, result) in loaded {
        match result {
            Ok(test) => suite.definitions.push(test),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "File rejected");
                suite.failures.push(err);
            }
        }
    }
    suite.failures.extend(internal);

    info!(
        loaded = suite.definitions.len(),
        failed = suite.failures.len(),
        "Suite loaded"
    );

    suite
}

/// Carrega a lista de ids externos (`[{"id": 12, "rfml_id": "login"}]`).
pub fn load_external_ids<P: AsRef<Path>>(path: P) -> Result<Vec<ExternalTest>> {
    let path_ref = path.as_ref();

    let content = std::fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read external ids file {:?}", path_ref))?;

    let ids = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse external ids JSON {:?}", path_ref))?;

    Ok(ids)
}

// ============================================================================
// TESTES
// ============================================================================
