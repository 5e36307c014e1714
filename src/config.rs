//! Configuração do papergate carregada a partir de `papergate.toml`.
//!
//! A struct [`PapergateConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `PAPERGATE_TOKEN` tem precedência sobre o arquivo.

use serde::Deserialize;
use std::path::Path;

use crate::error::PapergateError;
use crate::logs;

/// Configuração de nível superior carregada de `papergate.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PapergateConfig {
    /// Dono do repositório que hospeda o workflow de login.
    #[serde(default)]
    pub owner: String,

    /// Nome do repositório que hospeda o workflow de login.
    #[serde(default)]
    pub repo: String,

    /// Arquivo do workflow disparado a cada tentativa de login.
    #[serde(default = "default_workflow")]
    pub workflow: String,

    /// Branch em que o workflow é executado.
    #[serde(default = "default_git_ref")]
    pub git_ref: String,

    /// Token da API para os endpoints de Actions (opcional).
    #[serde(default)]
    pub api_token: String,

    /// Entrada do archive de logs que carrega o resultado do login.
    #[serde(default = "default_result_log")]
    pub result_log: String,

    /// Máximo de passagens de listagem ao procurar a execução.
    #[serde(default = "default_find_max_attempts")]
    pub find_max_attempts: u32,

    /// Intervalo em milissegundos entre passagens de listagem.
    #[serde(default = "default_find_interval_ms")]
    pub find_interval_ms: u64,

    /// Teto em milissegundos da espera pela conclusão do job remoto.
    #[serde(default = "default_completion_timeout_ms")]
    pub completion_timeout_ms: u64,
}

// Workflow de login padrão: "login.yml".
fn default_workflow() -> String {
    "login.yml".to_string()
}

// Branch padrão: "main".
fn default_git_ref() -> String {
    "main".to_string()
}

// Entrada padrão do resultado nos logs.
fn default_result_log() -> String {
    logs::RESULT_LOG_ENTRY.to_string()
}

// Valor padrão para passagens de listagem: 12.
fn default_find_max_attempts() -> u32 {
    12
}

// Valor padrão para o intervalo de listagem: 2000ms.
fn default_find_interval_ms() -> u64 {
    2000
}

// Valor padrão para o teto de conclusão: 120000ms.
fn default_completion_timeout_ms() -> u64 {
    120_000
}

impl Default for PapergateConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            workflow: default_workflow(),
            git_ref: default_git_ref(),
            api_token: String::new(),
            result_log: default_result_log(),
            find_max_attempts: default_find_max_attempts(),
            find_interval_ms: default_find_interval_ms(),
            completion_timeout_ms: default_completion_timeout_ms(),
        }
    }
}

impl PapergateConfig {
    /// Carrega a configuração de `papergate.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, PapergateError> {
        let path = Path::new("papergate.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<PapergateConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para o token.
        if let Ok(token) = std::env::var("PAPERGATE_TOKEN")
            && !token.is_empty()
        {
            config.api_token = token;
        }

        Ok(config)
    }

    /// Token da API, se configurado.
    pub fn api_token(&self) -> Option<String> {
        if self.api_token.is_empty() {
            None
        } else {
            Some(self.api_token.clone())
        }
    }
}
