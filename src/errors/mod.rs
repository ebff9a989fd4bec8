//! # Módulo de Códigos de Erro Estruturados
//!
//! Define códigos de erro padronizados para os problemas encontrados ao
//! ler arquivos RFML e ao validar uma suíte inteira.
//!
//! ## Categorias de Erro
//!
//! | Faixa  | Categoria       | Descrição                              |
//! |--------|-----------------|----------------------------------------|
//! | E1xxx  | Sintaxe         | Erro dentro de um arquivo RFML         |
//! | E2xxx  | Suíte           | Integridade entre arquivos (ids/embeds)|
//! | E4xxx  | Configuração    | Arquivo, limites, ambiente             |
//! | E5xxx  | Interno         | Bug no próprio validador               |
//!
//! ## Exemplo:
//!
//! ```text
//! [E2002] step 3 - embedded test id 'ghost' not found (tests/login.rfml)
//! ```

use std::fmt;

// ============================================================================
// CÓDIGO DE ERRO
// ============================================================================

/// Código de erro estruturado com categoria e número.
///
/// Primeiro dígito: categoria. Últimos 3 dígitos: erro específico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // ========================================================================
    // E1xxx: Sintaxe
    // ========================================================================

    /// Nenhuma linha `#!` no arquivo.
    pub const MISSING_IDENTITY: Self = Self(1001);

    /// Mais de uma linha `#!`, ou `#!` sem id.
    pub const INVALID_IDENTITY: Self = Self(1002);

    /// Segunda linha do step sem `?`.
    pub const MISSING_QUESTION: Self = Self(1003);

    /// Terceira linha no mesmo bloco, sem linha em branco entre steps.
    pub const UNSEPARATED_STEPS: Self = Self(1004);

    /// Action sem pergunta no fim do arquivo.
    pub const INCOMPLETE_STEP: Self = Self(1005);

    /// Valor de metadado inválido (inteiro, booleano, enum).
    pub const INVALID_METADATA_VALUE: Self = Self(1006);

    /// `# title:` ausente quando exigido.
    pub const MISSING_TITLE: Self = Self(1007);

    /// Conteúdo não é UTF-8.
    pub const INVALID_ENCODING: Self = Self(1008);

    // ========================================================================
    // E2xxx: Integridade da suíte
    // ========================================================================

    /// Dois arquivos com o mesmo id.
    pub const DUPLICATE_IDENTIFIER: Self = Self(2001);

    /// Embed para um id que não existe (local nem remoto).
    pub const UNRESOLVED_REFERENCE: Self = Self(2002);

    /// Testes que se embutem mutuamente (ou a si mesmos).
    pub const CIRCULAR_REFERENCE: Self = Self(2003);

    // ========================================================================
    // E4xxx: Configuração/Arquivos
    // ========================================================================

    /// Arquivo não encontrado.
    pub const FILE_NOT_FOUND: Self = Self(4001);

    /// Erro de permissão ou de leitura.
    pub const FILE_READ_ERROR: Self = Self(4002);

    /// Arquivo excede os limites configurados.
    pub const LIMIT_EXCEEDED: Self = Self(4003);

    /// Lista de ids externos ilegível.
    pub const INVALID_EXTERNAL_IDS: Self = Self(4004);

    // ========================================================================
    // E5xxx: Interno
    // ========================================================================

    /// Erro interno inesperado (ex: task de leitura abortada).
    pub const INTERNAL_ERROR: Self = Self(5001);

    /// Falha ao serializar o relatório.
    pub const SERIALIZATION_ERROR: Self = Self(5002);

    // ========================================================================
    // MÉTODOS
    // ========================================================================

    pub fn code(&self) -> u16 {
        self.0
    }

    /// Exemplo: `ErrorCode::MISSING_IDENTITY.formatted() == "E1001"`
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Syntax,
            2 => ErrorCategory::Suite,
            4 => ErrorCategory::Configuration,
            5 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Descrição curta para logs e relatórios.
    pub fn description(&self) -> &'static str {
        match self.0 {
            1001 => "Missing identity",
            1002 => "Invalid identity",
            1003 => "Missing question",
            1004 => "Steps not separated",
            1005 => "Incomplete step",
            1006 => "Invalid metadata value",
            1007 => "Missing title",
            1008 => "Invalid encoding",
            2001 => "Duplicate identifier",
            2002 => "Unresolved reference",
            2003 => "Circular reference",
            4001 => "File not found",
            4002 => "File read error",
            4003 => "Limit exceeded",
            4004 => "Invalid external identifiers",
            5001 => "Internal error",
            5002 => "Serialization error",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

impl serde::Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formatted())
    }
}

// ============================================================================
// CATEGORIA DE ERRO
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// E1xxx: problema dentro de um arquivo.
    Syntax,
    /// E2xxx: problema entre arquivos.
    Suite,
    /// E4xxx: ambiente, arquivos, limites.
    Configuration,
    /// E5xxx: bug.
    Internal,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax"),
            Self::Suite => write!(f, "Suite"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Internal => write!(f, "Internal"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================================================
// ERRO ESTRUTURADO
// ============================================================================

/// Erro com código, mensagem e onde aconteceu.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StructuredError {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub description: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl StructuredError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            category: code.category(),
            description: code.description(),
            message: message.into(),
            location: None,
            line: None,
        }
    }

    /// Arquivo (ou outra origem) do erro.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        if !location.is_empty() {
            self.location = Some(location);
        }
        self
    }

    /// Linha dentro do arquivo. Linha 0 = erro do arquivo inteiro, ignorada.
    pub fn with_line(mut self, line: usize) -> Self {
        if line > 0 {
            self.line = Some(line);
        }
        self
    }

    /// Formata o erro para exibição ao usuário.
    pub fn user_message(&self) -> String {
        let mut msg = format!("[{}] {}", self.code, self.message);

        match (&self.location, self.line) {
            (Some(location), Some(line)) => msg.push_str(&format!(" ({}:{})", location, line)),
            (Some(location), None) => msg.push_str(&format!(" ({})", location)),
            (None, Some(line)) => msg.push_str(&format!(" (line {})", line)),
            (None, None) => {}
        }

        msg
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for StructuredError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::MISSING_IDENTITY.formatted(), "E1001");
        assert_eq!(ErrorCode::CIRCULAR_REFERENCE.formatted(), "E2003");
        assert_eq!(ErrorCode::LIMIT_EXCEEDED.to_string(), "E4003");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::MISSING_QUESTION.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::DUPLICATE_IDENTIFIER.category(), ErrorCategory::Suite);
        assert_eq!(ErrorCode::FILE_NOT_FOUND.category(), ErrorCategory::Configuration);
        assert_eq!(ErrorCode::INTERNAL_ERROR.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_structured_error_with_location_and_line() {
        let err = StructuredError::new(ErrorCode::MISSING_QUESTION, "each step must contain a question")
            .with_location("tests/login.rfml")
            .with_line(7);

        assert_eq!(
            err.user_message(),
            "[E1003] each step must contain a question (tests/login.rfml:7)"
        );
    }

    #[test]
    fn test_structured_error_ignores_file_level_line() {
        let err = StructuredError::new(ErrorCode::MISSING_IDENTITY, "identity is required")
            .with_location("a.rfml")
            .with_line(0);

        assert!(err.line.is_none());
        assert_eq!(err.user_message(), "[E1001] identity is required (a.rfml)");
    }

    #[test]
    fn test_structured_error_serializes_code_as_string() {
        let err = StructuredError::new(ErrorCode::CIRCULAR_REFERENCE, "cycle");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "E2003");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_structured_error_carries_category_and_description() {
        let err = StructuredError::new(ErrorCode::SERIALIZATION_ERROR, "report");
        assert_eq!(err.category, ErrorCategory::Internal);
        assert_eq!(err.description, "Serialization error");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["category"], "internal");
        assert_eq!(json["description"], "Serialization error");
    }

    #[test]
    fn test_error_code_description() {
        let code = ErrorCode::UNRESOLVED_REFERENCE;
        assert_eq!(code.description(), "Unresolved reference");
        assert_eq!(code.category().to_string(), "Suite");
    }
}
