//! # Modelo de Dados RFML
//!
//! Estruturas normalizadas produzidas pelo parser e consumidas pelo
//! writer e pelo validador de suíte.
//!
//! Um arquivo RFML descreve **um** teste: metadados (título, tags,
//! browsers...) e uma lista ordenada de steps. Cada step é uma instrução
//! com pergunta de verificação, ou um embed que inclui outro teste
//! pelo seu identificador.
//!
//! ```text
//! #! login_flow              <- id
//! # title: Login             <- metadados
//! # tags: smoke, auth
//!
//! Open the login page.       <- action
//! Is the form visible?       <- response (precisa de '?')
//!
//! - shared_logout            <- embed
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `start_uri` usado quando o arquivo não declara nenhum.
pub const DEFAULT_START_URI: &str = "/";

static UPLOADABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{ *file\.(download|screenshot)\(([^\)]+)\) *\}\}")
        .expect("valid uploadable regex")
});

// ============================================================================
// TESTE
// ============================================================================

/// Um arquivo RFML já parseado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<FeatureId>,
    pub state: TestState,
    pub execute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub browsers: Vec<String>,
    /// Linhas de comentário não reconhecidas, cada uma terminada em `\n`.
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
    /// Origem do arquivo (normalmente o path). Só aparece em diagnósticos.
    #[serde(default)]
    pub source_location: String,
}

impl TestDefinition {
    /// Cria um teste vazio com os valores padrão do formato.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            start_uri: DEFAULT_START_URI.to_string(),
            site_id: None,
            feature_id: None,
            state: TestState::Enabled,
            execute: true,
            priority: None,
            tags: Vec::new(),
            browsers: Vec::new(),
            description: String::new(),
            steps: Vec::new(),
            source_location: String::new(),
        }
    }

    /// Define a origem usada nas mensagens de erro.
    pub fn with_source_location(mut self, location: impl Into<String>) -> Self {
        self.source_location = location.into();
        self
    }

    /// Embeds do teste, com o índice do step (base 0) onde aparecem.
    pub fn embeds(&self) -> impl Iterator<Item = (usize, &EmbeddedReference)> {
        self.steps.iter().enumerate().filter_map(|(index, step)| match step {
            Step::Embed(embed) => Some((index, embed)),
            Step::Instruction(_) => None,
        })
    }

    /// IDs dos testes embutidos, na ordem dos steps.
    pub fn embedded_ids(&self) -> Vec<&str> {
        self.embeds().map(|(_, embed)| embed.target_id.as_str()).collect()
    }

    /// Arquivos para upload referenciados pelos steps, com o índice do step.
    pub fn uploadable_files(&self) -> Vec<(usize, UploadableFile)> {
        self.steps
            .iter()
            .enumerate()
            .flat_map(|(index, step)| match step {
                Step::Instruction(instruction) => instruction
                    .uploadable_files()
                    .into_iter()
                    .map(|file| (index, file))
                    .collect::<Vec<_>>(),
                Step::Embed(_) => Vec::new(),
            })
            .collect()
    }

    /// `true` se algum step referencia arquivos para upload.
    pub fn has_uploadable_files(&self) -> bool {
        !self.uploadable_files().is_empty()
    }
}

// ============================================================================
// STEPS
// ============================================================================

/// Um step do teste. A ordem no arquivo é preservada exatamente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Instruction(InstructionStep),
    Embed(EmbeddedReference),
}

impl Step {
    pub fn redirect(&self) -> bool {
        match self {
            Step::Instruction(instruction) => instruction.redirect,
            Step::Embed(embed) => embed.redirect,
        }
    }
}

/// Par ação/verificação. `response` sempre contém `?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionStep {
    pub action: String,
    pub response: String,
    pub redirect: bool,
}

impl InstructionStep {
    /// Placeholders `{{ file.download(...) }}` e `{{ file.screenshot(...) }}`
    /// encontrados na action e depois na response.
    pub fn uploadable_files(&self) -> Vec<UploadableFile> {
        [self.action.as_str(), self.response.as_str()]
            .into_iter()
            .flat_map(|text| UPLOADABLE_RE.captures_iter(text))
            .filter_map(|capture| {
                let kind = match capture.get(1)?.as_str() {
                    "download" => UploadKind::Download,
                    _ => UploadKind::Screenshot,
                };
                let path = capture.get(2)?.as_str().trim().to_string();
                Some(UploadableFile { kind, path })
            })
            .collect()
    }
}

/// Inclui outro teste completo pelo seu id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedReference {
    pub target_id: String,
    pub redirect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Download,
    Screenshot,
}

/// Arquivo local referenciado dentro de um step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadableFile {
    pub kind: UploadKind,
    pub path: String,
}

// ============================================================================
// ENUMS DE METADADOS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    #[default]
    Enabled,
    Disabled,
    Draft,
}

impl TestState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
}

impl Priority {
    /// Aceita `p1`, `P1`, etc.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valor de `feature_id`. Um `# feature_id:` vazio remove a feature do teste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureId {
    Assigned(i64),
    Cleared,
}

// ============================================================================
// REGISTRO EXTERNO
// ============================================================================

/// Teste já conhecido pelo serviço remoto (`id` numérico + id RFML).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTest {
    pub id: i64,
    pub rfml_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(action: &str, response: &str) -> InstructionStep {
        InstructionStep {
            action: action.to_string(),
            response: response.to_string(),
            redirect: true,
        }
    }

    #[test]
    fn test_new_definition_defaults() {
        let test = TestDefinition::new("t1");
        assert_eq!(test.start_uri, "/");
        assert_eq!(test.state, TestState::Enabled);
        assert!(test.execute);
        assert!(test.steps.is_empty());
        assert!(test.source_location.is_empty());
    }

    #[test]
    fn test_embedded_ids_keep_step_order() {
        let mut test = TestDefinition::new("root");
        test.steps = vec![
            Step::Embed(EmbeddedReference { target_id: "b".to_string(), redirect: true }),
            Step::Instruction(instruction("Click", "Done?")),
            Step::Embed(EmbeddedReference { target_id: "a".to_string(), redirect: false }),
        ];

        assert_eq!(test.embedded_ids(), vec!["b", "a"]);
        let indexes: Vec<usize> = test.embeds().map(|(i, _)| i).collect();
        assert_eq!(indexes, vec![0, 2]);
    }

    #[test]
    fn test_uploadable_files_in_action_and_response() {
        let step = instruction(
            "Upload {{ file.download(./data/report.csv) }}",
            "Does it match {{file.screenshot(shots/ok.png)}}?",
        );

        let files = step.uploadable_files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].kind, UploadKind::Download);
        assert_eq!(files[0].path, "./data/report.csv");
        assert_eq!(files[1].kind, UploadKind::Screenshot);
        assert_eq!(files[1].path, "shots/ok.png");
    }

    #[test]
    fn test_has_uploadable_files() {
        let mut test = TestDefinition::new("t");
        test.steps.push(Step::Instruction(instruction("Open the page", "Loaded?")));
        assert!(!test.has_uploadable_files());

        test.steps.push(Step::Instruction(instruction(
            "Attach {{ file.download(a.txt) }}",
            "Attached?",
        )));
        assert!(test.has_uploadable_files());

        let files = test.uploadable_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, 1);
        assert_eq!(files[0].1.path, "a.txt");
    }

    #[test]
    fn test_priority_is_case_insensitive() {
        assert_eq!(Priority::parse("p2"), Some(Priority::P2));
        assert_eq!(Priority::parse("P3"), Some(Priority::P3));
        assert_eq!(Priority::parse("P4"), None);
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(TestState::parse("draft"), Some(TestState::Draft));
        assert_eq!(TestState::parse("Enabled"), None);
    }

    #[test]
    fn test_step_serializes_with_type_tag() {
        let step = Step::Embed(EmbeddedReference { target_id: "x".to_string(), redirect: true });
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "embed");
        assert_eq!(json["target_id"], "x");
    }
}
