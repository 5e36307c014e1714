//! Interface de linha de comando do papergate baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (login, logout, status)
//! e flags globais (--max-attempts, --timeout-secs, --verbose).

use clap::{Parser, Subcommand};

/// papergate — ponte de login via workflow para o site do grupo de leitura.
#[derive(Debug, Parser)]
#[command(name = "papergate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Máximo de passagens de listagem ao procurar a execução do workflow.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Teto em segundos da espera pela conclusão do job remoto.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Autentica disparando o workflow remoto de login.
    Login {
        /// Código de autorização externo repassado ao workflow.
        code: String,

        /// Uid de correlação fixo (por padrão, um hex aleatório por tentativa).
        #[arg(long)]
        uid: Option<String>,
    },

    /// Remove as credenciais salvas e encerra a sessão.
    Logout,

    /// Shows the currently authenticated user, if any.
    Status,
}
