//! Interface de terminal do papergate — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`LoginProgress`] acompanha visualmente uma
//! tentativa de login no terminal; o fluxo o alimenta como sink de
//! estágios, sem tocar no terminal diretamente.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::flow::{AttemptStatus, LoginAudit, Stage};
use crate::github::UserProfile;
use crate::login::StageSink;

/// Indicador visual de progresso para uma tentativa de login no terminal.
///
/// Exibe um spinner animado enquanto a ponte avança pelos estágios e
/// mensagens coloridas para sucesso (verde) e falha (vermelho).
pub struct LoginProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para estados intermediários.
    yellow: Style,
}

impl LoginProgress {
    /// Inicia o spinner para a tentativa identificada pelo uid.
    pub fn start(uid: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("Authenticating (uid {uid})"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para refletir o estágio atual.
    pub fn update_stage(&self, stage: Stage) {
        self.pb.set_message(format!("{stage}"));
    }

    /// Finaliza o spinner com a sessão autenticada.
    pub fn finish_success(&self, user: &UserProfile) {
        self.pb.finish_and_clear();
        println!(
            "  {} Logged in as {}",
            self.green.apply_to("✓"),
            user.display_name()
        );
    }

    /// Limpa o spinner sem mensagem; quem chamou reporta a falha.
    pub fn abandon(&self) {
        self.pb.finish_and_clear();
    }

    /// Imprime o registro de auditoria formatado em JSON com estilo colorido.
    pub fn print_audit(&self, record: &LoginAudit) {
        let status_style = match record.status {
            AttemptStatus::Authenticated => &self.green,
            AttemptStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Login Audit ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

impl StageSink for LoginProgress {
    fn stage_changed(&self, stage: Stage) {
        self.update_stage(stage);
    }
}
