//! # Módulo de Limites de Carregamento
//!
//! Define políticas de limite para proteger o carregamento de suítes
//! contra arquivos gigantes ou testes com um número absurdo de steps.
//!
//! ## Para todos entenderem:
//!
//! Uma suíte RFML pode ter centenas de arquivos. Sem limites, um arquivo
//! gerado por engano (ou um binário renomeado para `.rfml`) poderia
//! consumir toda a memória durante o parse.
//!
//! ## Limites configuráveis:
//!
//! | Limite             | Padrão | Descrição                              |
//! |--------------------|--------|----------------------------------------|
//! | max_file_bytes     | 1 MiB  | Tamanho máximo de um arquivo           |
//! | max_steps_per_test | 500    | Máximo de steps em um teste            |
//! | max_parallel_reads | 16     | Arquivos lidos/parseados em paralelo   |

use serde::{Deserialize, Serialize};

// ============================================================================
// LIMITES PADRÃO (CONSTANTES)
// ============================================================================

/// Tamanho máximo de um arquivo RFML (em bytes).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Número máximo de steps em um único teste.
pub const DEFAULT_MAX_STEPS_PER_TEST: usize = 500;

/// Número máximo de arquivos lidos em paralelo.
pub const DEFAULT_MAX_PARALLEL_READS: usize = 16;

// ============================================================================
// ESTRUTURA DE LIMITES
// ============================================================================

/// Configuração de limites do loader.
///
/// ## Exemplo de uso:
///
/// ```ignore
/// let limits = SuiteLimits {
///     max_parallel_reads: 4,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteLimits {
    /// Arquivos maiores são rejeitados antes do parse.
    pub max_file_bytes: u64,

    /// Testes com mais steps são rejeitados depois do parse.
    pub max_steps_per_test: usize,

    /// Tamanho do semáforo do loader. Nunca menor que 1.
    pub max_parallel_reads: usize,
}

impl Default for SuiteLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_steps_per_test: DEFAULT_MAX_STEPS_PER_TEST,
            max_parallel_reads: DEFAULT_MAX_PARALLEL_READS,
        }
    }
}

impl SuiteLimits {
    /// Cria limites a partir de variáveis de ambiente.
    ///
    /// Variáveis suportadas:
    /// - `RFML_MAX_FILE_BYTES`: Tamanho máximo de arquivo
    /// - `RFML_MAX_STEPS`: Máximo de steps por teste
    /// - `RFML_MAX_PARALLEL`: Máximo de leituras paralelas
    ///
    /// Valores inválidos são ignorados (fica o padrão).
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        if let Ok(val) = std::env::var("RFML_MAX_FILE_BYTES") {
            if let Ok(n) = val.trim().parse() {
                limits.max_file_bytes = n;
            }
        }

        if let Ok(val) = std::env::var("RFML_MAX_STEPS") {
            if let Ok(n) = val.trim().parse() {
                limits.max_steps_per_test = n;
            }
        }

        if let Ok(val) = std::env::var("RFML_MAX_PARALLEL") {
            if let Ok(n) = val.trim().parse::<usize>() {
                limits.max_parallel_reads = n.max(1);
            }
        }

        limits
    }

    /// Limites restritivos para testes.
    pub fn strict() -> Self {
        Self {
            max_file_bytes: 64 * 1024,
            max_steps_per_test: 50,
            max_parallel_reads: 2,
        }
    }

    /// Limites permissivos para suítes grandes.
    pub fn relaxed() -> Self {
        Self {
            max_file_bytes: 16 * 1024 * 1024,
            max_steps_per_test: 5_000,
            max_parallel_reads: 64,
        }
    }
}

// ============================================================================
// VALIDAÇÃO DE LIMITES
// ============================================================================

/// Resultado da validação de limites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitValidationResult {
    pub passed: bool,
    pub violations: Vec<LimitViolation>,
}

/// Violação de limite detectada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitViolation {
    /// Nome do limite violado.
    pub limit_name: String,
    /// Valor máximo permitido.
    pub limit_value: String,
    /// Valor encontrado no arquivo.
    pub actual_value: String,
    /// Mensagem descritiva.
    pub message: String,
}

impl LimitViolation {
    fn new(limit_name: &str, limit_value: impl ToString, actual_value: impl ToString, message: String) -> Self {
        Self {
            limit_name: limit_name.to_string(),
            limit_value: limit_value.to_string(),
            actual_value: actual_value.to_string(),
            message,
        }
    }
}

/// Verifica um arquivo contra os limites. Use `None` para `step_count`
/// quando o arquivo ainda não foi parseado.
pub fn validate_limits(
    file_bytes: u64,
    step_count: Option<usize>,
    limits: &SuiteLimits,
) -> LimitValidationResult {
    let mut violations = Vec::new();

    if file_bytes > limits.max_file_bytes {
        violations.push(LimitViolation::new(
            "max_file_bytes",
            limits.max_file_bytes,
            file_bytes,
            format!(
                "file has {} bytes, maximum allowed is {}",
                file_bytes, limits.max_file_bytes
            ),
        ));
    }

    if let Some(steps) = step_count {
        if steps > limits.max_steps_per_test {
            violations.push(LimitViolation::new(
                "max_steps_per_test",
                limits.max_steps_per_test,
                steps,
                format!(
                    "test has {} steps, maximum allowed is {}",
                    steps, limits.max_steps_per_test
                ),
            ));
        }
    }

    LimitValidationResult {
        passed: violations.is_empty(),
        violations,
    }
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SuiteLimits::default();
        assert_eq!(limits.max_file_bytes, 1024 * 1024);
        assert_eq!(limits.max_steps_per_test, 500);
        assert_eq!(limits.max_parallel_reads, 16);
    }

    #[test]
    fn test_strict_is_tighter_than_relaxed() {
        let strict = SuiteLimits::strict();
        let relaxed = SuiteLimits::relaxed();
        assert!(strict.max_file_bytes < relaxed.max_file_bytes);
        assert!(strict.max_steps_per_test < relaxed.max_steps_per_test);
        assert!(strict.max_parallel_reads < relaxed.max_parallel_reads);
    }

    #[test]
    fn test_validate_limits_ok() {
        let result = validate_limits(512, Some(10), &SuiteLimits::default());
        assert!(result.passed);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_validate_limits_file_too_large() {
        let limits = SuiteLimits::strict();
        let result = validate_limits(limits.max_file_bytes + 1, None, &limits);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].limit_name, "max_file_bytes");
        assert_eq!(result.violations[0].actual_value, "65537");
    }

    #[test]
    fn test_validate_limits_steps_exceeded() {
        let result = validate_limits(10, Some(51), &SuiteLimits::strict());
        assert!(!result.passed);
        assert_eq!(result.violations[0].limit_name, "max_steps_per_test");
        assert!(result.violations[0].message.contains("51 steps"));
    }

    #[test]
    fn test_validate_limits_at_boundary_passes() {
        let limits = SuiteLimits::strict();
        let result = validate_limits(limits.max_file_bytes, Some(limits.max_steps_per_test), &limits);
        assert!(result.passed);
    }
}
