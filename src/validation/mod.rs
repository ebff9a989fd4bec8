//! # Módulo de Validação de Suíte
//!
//! Valida a integridade de uma suíte inteira de testes RFML antes de
//! qualquer sincronização com o serviço remoto.
//!
//! ## Para leigos:
//!
//! Cada arquivo pode estar correto sozinho e mesmo assim a suíte estar
//! quebrada: dois arquivos com o mesmo id, um embed apontando para um
//! teste que não existe, ou dois testes que se embutem mutuamente (o que
//! geraria um loop infinito na execução).
//!
//! ## Validações realizadas (sempre todas, na ordem):
//!
//! 1. **Unicidade**: cada id aparece em um único arquivo
//! 2. **Ids externos**: ids já conhecidos pelo registro remoto viram nós
//! 3. **Embeds resolvidos**: todo embed aponta para um id conhecido
//! 4. **Sem ciclos**: nenhum teste embute a si mesmo, direta ou indiretamente
//!
//! Os erros são acumulados; a validação nunca para no primeiro.
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! let report = validate_suite(&tests, None);
//! if !report.is_valid() {
//!     for err in &report.errors {
//!         eprintln!("{}", err);
//!     }
//! }
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::errors::{ErrorCode, StructuredError};
use crate::graph::DependencyGraph;
use crate::protocol::{ExternalTest, TestDefinition};

// ============================================================================
// TIPOS DE ERRO
// ============================================================================

/// Problemas de integridade entre arquivos.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuiteError {
    /// O mesmo id em dois arquivos. O primeiro (em ordem de origem) é o
    /// canônico.
    #[error("duplicate id '{id}' in {location}, also found in: {canonical_location}")]
    DuplicateIdentifier {
        id: String,
        location: String,
        canonical_location: String,
    },

    /// Embed para um id desconhecido. `step_index` é base 0.
    #[error("{}", unresolved_message(.from_id, .step_index, .target_id, .external_lookup_attempted))]
    UnresolvedReference {
        from_id: String,
        location: String,
        step_index: usize,
        target_id: String,
        external_lookup_attempted: bool,
    },

    /// Testes que se embutem em ciclo. `members` vem ordenado.
    #[error("circular embedding between: {}", .members.join(", "))]
    CircularReference { members: Vec<String> },
}

fn unresolved_message(
    from_id: &str,
    step_index: &usize,
    target_id: &str,
    external_lookup_attempted: &bool,
) -> String {
    let mut msg = format!(
        "test '{}' step {} - embedded test id '{}' not found",
        from_id,
        step_index + 1,
        target_id
    );
    if !external_lookup_attempted {
        msg.push_str(
            ". Only local tests were checked; supply the external identifier list to check against remote tests",
        );
    }
    msg
}

impl SuiteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateIdentifier { .. } => ErrorCode::DUPLICATE_IDENTIFIER,
            Self::UnresolvedReference { .. } => ErrorCode::UNRESOLVED_REFERENCE,
            Self::CircularReference { .. } => ErrorCode::CIRCULAR_REFERENCE,
        }
    }

    /// Arquivo que precisa ser corrigido, quando existe um só.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::DuplicateIdentifier { location, .. } | Self::UnresolvedReference { location, .. } => {
                Some(location.as_str())
            }
            Self::CircularReference { .. } => None,
        }
    }

    pub fn to_structured(&self) -> StructuredError {
        let err = StructuredError::new(self.code(), self.to_string());
        match self.location() {
            Some(location) => err.with_location(location),
            None => err,
        }
    }
}

/// `Ok(())` = suíte válida. `Err` = todos os problemas encontrados.
pub type ValidationResult = Result<(), Vec<SuiteError>>;

// ============================================================================
// RELATÓRIO
// ============================================================================

/// Resultado completo de uma validação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Duplicados, depois embeds não resolvidos, depois ciclos.
    pub errors: Vec<SuiteError>,
    /// `true` se uma lista de ids externos foi fornecida.
    pub external_lookup_attempted: bool,
    pub definitions: usize,
    pub nodes: usize,
    pub edges: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

// ============================================================================
// FUNÇÃO PRINCIPAL DE VALIDAÇÃO
// ============================================================================

/// Valida uma suíte de testes já parseados.
///
/// ## Parâmetros:
///
/// - `definitions`: testes locais, em qualquer ordem. São processados
///   ordenados por `source_location` (ordenação estável), então o arquivo
///   canônico de um id duplicado não depende da ordem de entrada.
/// - `external`: ids já conhecidos pelo serviço remoto. `None` significa
///   validação apenas local, o que não é um erro.
pub fn validate_suite(
    definitions: &[TestDefinition],
    external: Option<&[ExternalTest]>,
) -> ValidationReport {
    validate_suite_with_unloaded(definitions, external, &[])
}

/// Igual a [`validate_suite`], mas `unloaded` lista ids de arquivos que
/// existem e não parsearam. Eles viram nós folha: embeds para eles não são
/// reportados como não encontrados, já que o arquivo tem seu próprio erro
/// de sintaxe.
#[instrument(
    skip_all,
    fields(definitions = definitions.len(), external = external.is_some(), unloaded = unloaded.len())
)]
pub fn validate_suite_with_unloaded(
    definitions: &[TestDefinition],
    external: Option<&[ExternalTest]>,
    unloaded: &[&str],
) -> ValidationReport {
    let mut ordered: Vec<&TestDefinition> = definitions.iter().collect();
    ordered.sort_by(|a, b| a.source_location.cmp(&b.source_location));

    let mut graph = DependencyGraph::new();
    let mut errors = Vec::new();

    check_unique_ids(&ordered, &mut graph, &mut errors);

    if let Some(external) = external {
        seed_leaf_ids(external.iter().map(|test| test.rfml_id.as_str()), &mut graph);
    }
    seed_leaf_ids(unloaded.iter().copied(), &mut graph);

    let lookup_attempted = external.is_some();
    link_embeds(&ordered, lookup_attempted, &mut graph, &mut errors);

    for members in graph.cycles() {
        errors.push(SuiteError::CircularReference { members });
    }

    let report = ValidationReport {
        errors,
        external_lookup_attempted: lookup_attempted,
        definitions: definitions.len(),
        nodes: graph.len(),
        edges: graph.edge_count(),
    };

    if report.is_valid() {
        info!(nodes = report.nodes, edges = report.edges, "Suite is valid");
    } else {
        warn!(errors = report.errors.len(), "Suite validation failed");
    }

    report
}

// ============================================================================
// PASSOS
// ============================================================================

/// Passo 1: o primeiro arquivo de cada id é canônico.
fn check_unique_ids(
    ordered: &[&TestDefinition],
    graph: &mut DependencyGraph,
    errors: &mut Vec<SuiteError>,
) {
    let mut canonical: HashMap<&str, &str> = HashMap::new();

    for test in ordered {
        if let Some(first) = canonical.get(test.id.as_str()) {
            errors.push(SuiteError::DuplicateIdentifier {
                id: test.id.clone(),
                location: test.source_location.clone(),
                canonical_location: first.to_string(),
            });
        } else {
            canonical.insert(&test.id, &test.source_location);
            graph.add_node(&test.id);
        }
    }
}

/// Passo 2: ids remotos e de arquivos quebrados viram nós folha (sem arestas
/// de saída).
fn seed_leaf_ids<'a>(ids: impl IntoIterator<Item = &'a str>, graph: &mut DependencyGraph) {
    for id in ids {
        if !graph.contains(id) {
            graph.add_node(id);
        }
    }
}

/// Passo 3: uma aresta por embed resolvido, um erro por embed não resolvido.
fn link_embeds(
    ordered: &[&TestDefinition],
    lookup_attempted: bool,
    graph: &mut DependencyGraph,
    errors: &mut Vec<SuiteError>,
) {
    for test in ordered {
        let from = graph.add_node(&test.id);

        for (step_index, embed) in test.embeds() {
            match graph.node(&embed.target_id) {
                Some(to) => graph.add_edge(from, to),
                None => errors.push(SuiteError::UnresolvedReference {
                    from_id: test.id.clone(),
                    location: test.source_location.clone(),
                    step_index,
                    target_id: embed.target_id.clone(),
                    external_lookup_attempted: lookup_attempted,
                }),
            }
        }
    }
}

// ============================================================================
// TESTES
// ============================================================================
