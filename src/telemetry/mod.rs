//! # Módulo de Telemetria - Logs Estruturados
//!
//! Configura o `tracing` para toda a ferramenta.
//!
//! ## Para todos entenderem:
//!
//! O loader e o validador emitem eventos (`info!`, `warn!`, `debug!`) e
//! spans (`#[instrument]`). Este módulo decide para onde eles vão e qual
//! nível aparece.
//!
//! Os logs vão sempre para **stderr**: o stdout é reservado para o
//! relatório JSON e para a saída de `parse`/`fmt`.
//!
//! ## Variáveis de ambiente:
//!
//! | Variável           | Descrição                                  |
//! |--------------------|--------------------------------------------|
//! | `RUST_LOG`         | Filtro completo (tem prioridade)           |
//! | `RFML_LOG_LEVEL`   | Nível padrão: error, warn, info, debug     |
//! | `RFML_LOG_CONSOLE` | `false` desliga a saída no console         |

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::parser::parse_bool;

// ============================================================================
// CONFIGURAÇÃO
// ============================================================================

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Nome registrado no evento de inicialização.
    pub service_name: String,

    /// Se `false`, nenhum log é escrito (útil em scripts).
    pub enable_console_logging: bool,

    /// Nível usado quando `RUST_LOG` não está definido.
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "rfml".to_string(),
            enable_console_logging: true,
            log_level: Level::WARN,
        }
    }
}

impl TelemetryConfig {
    /// Lê `RFML_LOG_LEVEL` e `RFML_LOG_CONSOLE`. Valores inválidos são
    /// ignorados.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("RFML_LOG_LEVEL") {
            if let Ok(level) = level.trim().parse::<Level>() {
                config.log_level = level;
            }
        }

        if let Ok(console) = std::env::var("RFML_LOG_CONSOLE") {
            if let Some(enabled) = parse_bool(console.trim()) {
                config.enable_console_logging = enabled;
            }
        }

        config
    }

    /// `--verbose` na CLI: no mínimo `debug`.
    pub fn verbose(mut self) -> Self {
        if self.log_level < Level::DEBUG {
            self.log_level = Level::DEBUG;
        }
        self
    }
}

// ============================================================================
// INICIALIZAÇÃO
// ============================================================================

/// Instala o subscriber global. Falha se já houver um instalado.
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<()> {
    // Primeiro tenta ler de RUST_LOG, senão usa o nível configurado.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.enable_console_logging {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::debug!(
        service_name = %config.service_name,
        level = %config.log_level,
        "Telemetry initialized"
    );

    Ok(())
}
