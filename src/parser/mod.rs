//! # Módulo de Parsing RFML
//!
//! Converte os bytes de **um** arquivo RFML em um [`TestDefinition`].
//!
//! ## Gramática (por linha, sempre com trim):
//!
//! | Linha            | Significado                                    |
//! |------------------|------------------------------------------------|
//! | `#! id`          | Identidade do teste (exatamente uma)           |
//! | `# chave: valor` | Metadado; chave desconhecida vira descrição    |
//! | `# texto`        | Linha de descrição                             |
//! | `- id`           | Embed de outro teste (no início de um bloco)   |
//! | outra linha      | Bloco de instrução: action, depois response    |
//! | linha vazia      | Fecha o bloco de instrução                     |
//!
//! Um bloco de instrução tem exatamente duas linhas: a action e a
//! response, que precisa conter `?`. Uma terceira linha sem linha vazia
//! antes é erro. Uma action sozinha no fim do arquivo também é erro.
//!
//! ## Redirect
//!
//! `# redirect: false` vale só para o próximo step/embed. Depois volta
//! para `ParseOptions::redirect_default`.
//!
//! O parsing para no primeiro erro. Cada chamada cria seu próprio
//! `ParseContext`, então parses concorrentes não compartilham estado.

use thiserror::Error;
use tracing::debug;

use crate::errors::{ErrorCode, StructuredError};
use crate::lexer::{self, Lexer, Token, TokenKind};
use crate::protocol::{
    EmbeddedReference, FeatureId, InstructionStep, Priority, Step, TestDefinition, TestState,
};

// ============================================================================
// TIPOS DE ERRO
// ============================================================================

/// Motivo de um erro de sintaxe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("identity is required, start a line with #! followed by a unique id")]
    MissingIdentity,

    #[error("only one identity may be specified")]
    DuplicateIdentity,

    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("each step must contain a question, with a `?`")]
    MissingQuestion,

    #[error("steps must be separated by blank lines")]
    UnseparatedSteps,

    #[error("each action must have a corresponding question")]
    IncompleteStep,

    #[error("{field} must be a valid integer")]
    InvalidInteger { field: &'static str },

    #[error("{field} must be a valid boolean")]
    InvalidBoolean { field: &'static str },

    #[error("state '{value}' is not one of enabled, disabled, draft")]
    InvalidState { value: String },

    #[error("priority '{value}' is not one of P1, P2, P3")]
    InvalidPriority { value: String },

    #[error("title is required, specify it using \"# title:\" followed by the test's title")]
    MissingTitle,

    #[error("file is not valid UTF-8")]
    InvalidEncoding,
}

impl SyntaxErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingIdentity => ErrorCode::MISSING_IDENTITY,
            Self::DuplicateIdentity | Self::EmptyIdentity => ErrorCode::INVALID_IDENTITY,
            Self::MissingQuestion => ErrorCode::MISSING_QUESTION,
            Self::UnseparatedSteps => ErrorCode::UNSEPARATED_STEPS,
            Self::IncompleteStep => ErrorCode::INCOMPLETE_STEP,
            Self::InvalidInteger { .. }
            | Self::InvalidBoolean { .. }
            | Self::InvalidState { .. }
            | Self::InvalidPriority { .. } => ErrorCode::INVALID_METADATA_VALUE,
            Self::MissingTitle => ErrorCode::MISSING_TITLE,
            Self::InvalidEncoding => ErrorCode::INVALID_ENCODING,
        }
    }
}

/// Erro de sintaxe localizado. Linha 0 = erro do arquivo inteiro.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct SyntaxError {
    pub line: usize,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn new(line: usize, kind: SyntaxErrorKind) -> Self {
        Self { line, kind }
    }

    pub fn reason(&self) -> String {
        self.kind.to_string()
    }

    pub fn to_structured(&self, location: &str) -> StructuredError {
        StructuredError::new(self.kind.code(), self.reason())
            .with_location(location)
            .with_line(self.line)
    }
}

// ============================================================================
// OPÇÕES
// ============================================================================

/// Opções de parsing. Também usadas pelo writer, que precisa do mesmo
/// `redirect_default` para gerar um texto equivalente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Redirect de cada step quando não há `# redirect:` logo antes.
    pub redirect_default: bool,
    /// Rejeita arquivos sem `# title:`.
    pub require_title: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            redirect_default: true,
            require_title: false,
        }
    }
}

impl ParseOptions {
    /// Lê `RFML_REDIRECT_DEFAULT` e `RFML_REQUIRE_TITLE`. Valores
    /// inválidos são ignorados.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("RFML_REDIRECT_DEFAULT") {
            if let Some(b) = parse_bool(&val) {
                options.redirect_default = b;
            }
        }

        if let Ok(val) = std::env::var("RFML_REQUIRE_TITLE") {
            if let Some(b) = parse_bool(&val) {
                options.require_title = b;
            }
        }

        options
    }
}

// ============================================================================
// API PÚBLICA
// ============================================================================

/// Parseia texto já decodificado.
pub fn parse_str(source: &str, options: &ParseOptions) -> Result<TestDefinition, SyntaxError> {
    let mut ctx = ParseContext::new(options);
    for token in Lexer::new(source) {
        ctx.consume(token)?;
    }
    ctx.finish()
}

/// Parseia bytes brutos (decodifica UTF-8 primeiro).
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<TestDefinition, SyntaxError> {
    parse_str(lexer::decode(bytes)?, options)
}

/// Parseia bytes e registra a origem no teste resultante.
pub fn parse_with_location(
    bytes: &[u8],
    location: &str,
    options: &ParseOptions,
) -> Result<TestDefinition, SyntaxError> {
    let test = parse_bytes(bytes, options)?.with_source_location(location);
    debug!(
        id = %test.id,
        location,
        steps = test.steps.len(),
        uploads = test.uploadable_files().len(),
        "RFML parsed"
    );
    Ok(test)
}

/// Id declarado em um arquivo que não parseou, se houver um `#!` legível.
/// Permite que o validador não acuse como "não encontrado" um embed para um
/// teste que existe mas está quebrado.
pub fn recover_identity(bytes: &[u8]) -> Option<String> {
    let source = String::from_utf8_lossy(bytes);
    Lexer::new(&source).find_map(|token| match token.kind {
        TokenKind::Identity(id) if !id.is_empty() => Some(id),
        _ => None,
    })
}

// ============================================================================
// CONTEXTO DE PARSING
// ============================================================================

/// Linha acumulada de um bloco de instrução.
#[derive(Debug)]
struct BlockLine {
    line: usize,
    text: String,
}

/// Estado de um parse. Criado por chamada, nunca compartilhado.
struct ParseContext<'o> {
    options: &'o ParseOptions,
    test: TestDefinition,
    identity_line: Option<usize>,
    block: Vec<BlockLine>,
    redirect_override: Option<bool>,
}

impl<'o> ParseContext<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            test: TestDefinition::new(String::new()),
            identity_line: None,
            block: Vec::with_capacity(2),
            redirect_override: None,
        }
    }

    fn consume(&mut self, token: Token) -> Result<(), SyntaxError> {
        match &token.kind {
            TokenKind::Identity(id) => self.identity(token.line, id),
            TokenKind::Metadata { key, value } => self.metadata(&token, key, value),
            TokenKind::Comment => {
                self.push_description(token.comment_body());
                Ok(())
            }
            TokenKind::Dash(target) if self.block.is_empty() => {
                let redirect = self.take_redirect();
                self.test.steps.push(Step::Embed(EmbeddedReference {
                    target_id: target.clone(),
                    redirect,
                }));
                Ok(())
            }
            TokenKind::Dash(_) | TokenKind::Content => self.block_line(token.line, token.text),
            TokenKind::Blank => self.blank(token.line),
            TokenKind::Eof => self.eof(),
        }
    }

    fn identity(&mut self, line: usize, id: &str) -> Result<(), SyntaxError> {
        if self.identity_line.is_some() {
            return Err(SyntaxError::new(line, SyntaxErrorKind::DuplicateIdentity));
        }
        if id.is_empty() {
            return Err(SyntaxError::new(line, SyntaxErrorKind::EmptyIdentity));
        }
        self.identity_line = Some(line);
        self.test.id = id.to_string();
        Ok(())
    }

    fn metadata(&mut self, token: &Token, key: &str, value: &str) -> Result<(), SyntaxError> {
        let line = token.line;
        match key {
            "title" => self.test.title = value.to_string(),
            "start_uri" => self.test.start_uri = value.to_string(),
            "site_id" => {
                let site_id = value
                    .parse::<i64>()
                    .map_err(|_| SyntaxError::new(line, SyntaxErrorKind::InvalidInteger { field: "site_id" }))?;
                self.test.site_id = Some(site_id);
            }
            "feature_id" => {
                self.test.feature_id = if value.is_empty() {
                    Some(FeatureId::Cleared)
                } else {
                    let id = value.parse::<i64>().map_err(|_| {
                        SyntaxError::new(line, SyntaxErrorKind::InvalidInteger { field: "feature_id" })
                    })?;
                    Some(FeatureId::Assigned(id))
                };
            }
            "tags" => self.test.tags = split_list(value),
            "browsers" => self.test.browsers = split_list(value),
            "redirect" => {
                let redirect = parse_bool(value)
                    .ok_or_else(|| SyntaxError::new(line, SyntaxErrorKind::InvalidBoolean { field: "redirect" }))?;
                self.redirect_override = Some(redirect);
            }
            "execute" => {
                self.test.execute = parse_bool(value)
                    .ok_or_else(|| SyntaxError::new(line, SyntaxErrorKind::InvalidBoolean { field: "execute" }))?;
            }
            "state" => {
                self.test.state = TestState::parse(value).ok_or_else(|| {
                    SyntaxError::new(line, SyntaxErrorKind::InvalidState { value: value.to_string() })
                })?;
            }
            "priority" => {
                self.test.priority = if value.is_empty() {
                    None
                } else {
                    Some(Priority::parse(value).ok_or_else(|| {
                        SyntaxError::new(line, SyntaxErrorKind::InvalidPriority { value: value.to_string() })
                    })?)
                };
            }
            _ => self.push_description(token.comment_body()),
        }
        Ok(())
    }

    fn push_description(&mut self, text: &str) {
        self.test.description.push_str(text);
        self.test.description.push('\n');
    }

    fn block_line(&mut self, line: usize, text: String) -> Result<(), SyntaxError> {
        match self.block.len() {
            0 => {}
            1 if text.contains('?') => {}
            1 => return Err(SyntaxError::new(line, SyntaxErrorKind::MissingQuestion)),
            _ => return Err(SyntaxError::new(line, SyntaxErrorKind::UnseparatedSteps)),
        }
        self.block.push(BlockLine { line, text });
        Ok(())
    }

    fn blank(&mut self, line: usize) -> Result<(), SyntaxError> {
        match self.block.len() {
            0 => Ok(()),
            1 => Err(SyntaxError::new(line, SyntaxErrorKind::MissingQuestion)),
            _ => {
                self.close_block();
                Ok(())
            }
        }
    }

    fn eof(&mut self) -> Result<(), SyntaxError> {
        match self.block.first() {
            None => Ok(()),
            Some(action) if self.block.len() == 1 => {
                Err(SyntaxError::new(action.line, SyntaxErrorKind::IncompleteStep))
            }
            Some(_) => {
                self.close_block();
                Ok(())
            }
        }
    }

    fn close_block(&mut self) {
        let mut lines = std::mem::take(&mut self.block).into_iter();
        if let (Some(action), Some(response)) = (lines.next(), lines.next()) {
            let redirect = self.take_redirect();
            self.test.steps.push(Step::Instruction(InstructionStep {
                action: action.text,
                response: response.text,
                redirect,
            }));
        }
    }

    fn take_redirect(&mut self) -> bool {
        self.redirect_override
            .take()
            .unwrap_or(self.options.redirect_default)
    }

    fn finish(self) -> Result<TestDefinition, SyntaxError> {
        if self.identity_line.is_none() {
            return Err(SyntaxError::new(0, SyntaxErrorKind::MissingIdentity));
        }
        if self.options.require_title && self.test.title.is_empty() {
            return Err(SyntaxError::new(0, SyntaxErrorKind::MissingTitle));
        }
        Ok(self.test)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Lista separada por vírgulas; entradas vazias são descartadas.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Booleanos aceitos nos metadados.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "True" | "TRUE" | "t" | "T" | "1" => Some(true),
        "false" | "False" | "FALSE" | "f" | "F" | "0" => Some(false),
        _ => None,
    }
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<TestDefinition, SyntaxError> {
        parse_str(source, &ParseOptions::default())
    }

    fn instruction(step: &Step) -> &InstructionStep {
        match step {
            Step::Instruction(instruction) => instruction,
            other => panic!("expected instruction, got {:?}", other),
        }
    }

    fn embed(step: &Step) -> &EmbeddedReference {
        match step {
            Step::Embed(embed) => embed,
            other => panic!("expected embed, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_minimal_file() {
        let test = parse("#! t1\n# title: T\nDo X.\nDid X happen?\n").unwrap();

        assert_eq!(test.id, "t1");
        assert_eq!(test.title, "T");
        assert_eq!(test.steps.len(), 1);
        let step = instruction(&test.steps[0]);
        assert_eq!(step.action, "Do X.");
        assert_eq!(step.response, "Did X happen?");
        assert!(step.redirect);
    }

    #[test]
    fn test_full_header() {
        let source = "#! my_rfml_id
# title: my_title
# start_uri: /testing
# site_id: 12345
# feature_id: 98765
# tags: foo, bar
# browsers: chrome, firefox
# state: draft
# priority: p1
# execute: false

First Action
First Question?

Second Action
Second Question?

- embedded_id";

        let test = parse(source).unwrap();
        assert_eq!(test.id, "my_rfml_id");
        assert_eq!(test.start_uri, "/testing");
        assert_eq!(test.site_id, Some(12345));
        assert_eq!(test.feature_id, Some(FeatureId::Assigned(98765)));
        assert_eq!(test.tags, vec!["foo", "bar"]);
        assert_eq!(test.browsers, vec!["chrome", "firefox"]);
        assert_eq!(test.state, TestState::Draft);
        assert_eq!(test.priority, Some(Priority::P1));
        assert!(!test.execute);
        assert_eq!(test.steps.len(), 3);
        assert_eq!(embed(&test.steps[2]).target_id, "embedded_id");
        assert!(test.description.is_empty());
    }

    #[test]
    fn test_defaults_when_header_is_minimal() {
        let test = parse("#! only_id").unwrap();
        assert_eq!(test.start_uri, "/");
        assert_eq!(test.state, TestState::Enabled);
        assert!(test.execute);
        assert!(test.site_id.is_none());
        assert!(test.steps.is_empty());
    }

    #[test]
    fn test_tags_are_trimmed_and_empty_entries_dropped() {
        let test = parse("#! x\n# tags: a, b ,c\n# browsers: ,chrome,, \n").unwrap();
        assert_eq!(test.tags, vec!["a", "b", "c"]);
        assert_eq!(test.browsers, vec!["chrome"]);
    }

    #[test]
    fn test_unknown_keys_and_comments_become_description() {
        let source = "#! x\n# this_should: be a comment\n# plain note\n#\n# title: T\n";
        let test = parse(source).unwrap();
        assert_eq!(test.description, "this_should: be a comment\nplain note\n\n");
        assert_eq!(test.title, "T");
    }

    #[test]
    fn test_redirect_override_applies_to_one_step_only() {
        let source = "#! x

# redirect: false
First
First?

Second
Second?

# redirect: false
- other

- again";
        let test = parse(source).unwrap();
        assert!(!test.steps[0].redirect());
        assert!(test.steps[1].redirect());
        assert!(!test.steps[2].redirect());
        assert!(test.steps[3].redirect());
    }

    #[test]
    fn test_redirect_default_from_options() {
        let options = ParseOptions {
            redirect_default: false,
            ..Default::default()
        };
        let test = parse_str("#! x\n\n# redirect: true\n- a\n\n- b\n", &options).unwrap();
        assert!(test.steps[0].redirect());
        assert!(!test.steps[1].redirect());
    }

    #[test]
    fn test_missing_question_cites_second_line() {
        let err = parse("#! x\n\nClick the button\nThe button is clicked\n").unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(err.kind, SyntaxErrorKind::MissingQuestion);
        assert!(err.reason().contains("each step must contain a question"));
    }

    #[test]
    fn test_blank_line_after_action_is_missing_question() {
        let err = parse("#! x\nClick\n\nDone?\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, SyntaxErrorKind::MissingQuestion);
    }

    #[test]
    fn test_third_line_requires_blank_separator() {
        let err = parse("#! x\nClick\nDone?\nNext action\nNext?\n").unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(err.kind, SyntaxErrorKind::UnseparatedSteps);
    }

    #[test]
    fn test_dangling_action_at_eof_is_rejected() {
        let err = parse("#! x\n\nFirst\nFirst?\n\nLonely action\n").unwrap_err();
        assert_eq!(err.line, 6);
        assert_eq!(err.kind, SyntaxErrorKind::IncompleteStep);
    }

    #[test]
    fn test_comment_inside_open_block_goes_to_description() {
        let test = parse("#! x\nAct\n# note\nOk?\n").unwrap();
        assert_eq!(test.steps.len(), 1);
        assert_eq!(test.description, "note\n");
        let step = instruction(&test.steps[0]);
        assert_eq!(step.action, "Act");
        assert_eq!(step.response, "Ok?");
    }

    #[test]
    fn test_redirect_before_closing_blank_applies_to_closed_block() {
        let test = parse("#! x\nA\nB?\n# redirect: false\n\nC\nD?").unwrap();
        let redirects: Vec<bool> = test.steps.iter().map(Step::redirect).collect();
        assert_eq!(redirects, vec![false, true]);
    }

    #[test]
    fn test_recover_identity_from_broken_file() {
        assert_eq!(
            recover_identity(b"# title: T\n#! broken\nAct\nNo question\n"),
            Some("broken".to_string())
        );
        assert_eq!(recover_identity(b"#!\nAct\n"), None);
        assert_eq!(recover_identity(b"\xff\n#! lossy\n"), Some("lossy".to_string()));
    }

    #[test]
    fn test_step_at_eof_without_trailing_newline() {
        let test = parse("#! x\nAction\nQuestion?").unwrap();
        assert_eq!(test.steps.len(), 1);
    }

    #[test]
    fn test_dash_inside_block_is_response_text() {
        let test = parse("#! x\nType the value\n- is it negative?\n").unwrap();
        assert_eq!(instruction(&test.steps[0]).response, "- is it negative?");
    }

    #[test]
    fn test_missing_identity() {
        let err = parse("# title: no id\nA\nB?\n").unwrap_err();
        assert_eq!(err.line, 0);
        assert_eq!(err.kind, SyntaxErrorKind::MissingIdentity);
        assert!(err.reason().contains("identity is required"));
    }

    #[test]
    fn test_second_identity_is_rejected() {
        let err = parse("#! a\n#! b\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, SyntaxErrorKind::DuplicateIdentity);
    }

    #[test]
    fn test_empty_identity_is_rejected() {
        let err = parse("#!   \n").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::EmptyIdentity);
    }

    #[test]
    fn test_invalid_metadata_values() {
        let cases = [
            ("#! x\n# site_id: abc\n", SyntaxErrorKind::InvalidInteger { field: "site_id" }),
            ("#! x\n# feature_id: 1.5\n", SyntaxErrorKind::InvalidInteger { field: "feature_id" }),
            ("#! x\n# redirect: maybe\n", SyntaxErrorKind::InvalidBoolean { field: "redirect" }),
            ("#! x\n# execute: yes\n", SyntaxErrorKind::InvalidBoolean { field: "execute" }),
            ("#! x\n# state: archived\n", SyntaxErrorKind::InvalidState { value: "archived".to_string() }),
            ("#! x\n# priority: P9\n", SyntaxErrorKind::InvalidPriority { value: "P9".to_string() }),
        ];

        for (source, expected) in cases {
            let err = parse(source).unwrap_err();
            assert_eq!(err.line, 2, "source: {:?}", source);
            assert_eq!(err.kind, expected);
            assert_eq!(err.kind.code(), ErrorCode::INVALID_METADATA_VALUE);
        }
    }

    #[test]
    fn test_empty_feature_id_clears_feature() {
        let test = parse("#! x\n# feature_id:\n").unwrap();
        assert_eq!(test.feature_id, Some(FeatureId::Cleared));
    }

    #[test]
    fn test_require_title() {
        let options = ParseOptions {
            require_title: true,
            ..Default::default()
        };
        let err = parse_str("#! x\n", &options).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MissingTitle);
        assert!(parse_str("#! x\n# title: ok\n", &options).is_ok());
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes(b"#! x\n\xc3\x28\n", &ParseOptions::default()).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, SyntaxErrorKind::InvalidEncoding);
    }

    #[test]
    fn test_parse_with_location_sets_source() {
        let test = parse_with_location(b"#! x\n", "suite/x.rfml", &ParseOptions::default()).unwrap();
        assert_eq!(test.source_location, "suite/x.rfml");
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let source = b"#! x\n# tags: b, a\n\nA\nA?\n\n- y\n";
        let first = parse_bytes(source, &ParseOptions::default()).unwrap();
        let second = parse_bytes(source, &ParseOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_syntax_error_to_structured() {
        let err = SyntaxError::new(4, SyntaxErrorKind::UnseparatedSteps);
        let structured = err.to_structured("a.rfml");
        assert_eq!(structured.code, ErrorCode::UNSEPARATED_STEPS);
        assert_eq!(structured.user_message(), "[E1004] steps must be separated by blank lines (a.rfml:4)");
        assert_eq!(err.to_string(), "line 4: steps must be separated by blank lines");
    }
}
