//! Tipos de dados para os registros da API de Actions e de usuário do GitHub.
//!
//! Todas as structs derivam `Serialize`/`Deserialize` conforme o formato
//! dos endpoints de listagem de execuções, listagem de jobs, dispatch de
//! workflow e perfil de usuário.

use serde::{Deserialize, Serialize};

/// Resumo de uma execução de workflow retornado pelo endpoint de listagem.
///
/// Imutável depois de concluída; o fluxo de login só observa estes três
/// campos do registro completo da API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Identificador numérico da execução.
    pub id: u64,
    /// URL absoluta para listar os jobs desta execução.
    pub jobs_url: String,
    /// Status atual ("queued", "in_progress", "completed").
    pub status: String,
}

/// Página de execuções retornada por `GET .../actions/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunPage {
    /// Total de execuções que casam com o filtro.
    pub total_count: u64,
    /// Execuções desta página.
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Um job dentro de uma execução de workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJob {
    /// Identificador numérico do job.
    pub id: u64,
    /// Execução à qual o job pertence.
    pub run_id: u64,
    /// Nome do job conforme definido no workflow.
    pub name: String,
    /// Status atual ("queued", "in_progress", "completed").
    pub status: String,
    /// Conclusão quando `status == "completed"` ("success", "failure", ...).
    /// `None` enquanto o job ainda executa.
    #[serde(default)]
    pub conclusion: Option<String>,
    /// Passos ordenados do job.
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

/// Página de jobs retornada pela `jobs_url` de uma execução.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPage {
    /// Total de jobs da execução.
    pub total_count: u64,
    /// Jobs desta página.
    pub jobs: Vec<RunJob>,
}

/// Um passo nomeado dentro de um job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    /// Nome do passo. O workflow de login embute o uid de correlação aqui.
    pub name: String,
    /// Posição do passo dentro do job, começando em 1.
    pub number: u32,
}

/// Corpo da requisição para o endpoint de workflow-dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRequest {
    /// Branch ou tag em que o workflow será executado.
    /// Serializado como `"ref"` no JSON via `serde(rename)`.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Entradas passadas ao workflow.
    pub inputs: DispatchInputs,
}

/// Entradas do workflow de login: código de autorização e uid de correlação.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchInputs {
    /// Código de autorização externo repassado ao workflow.
    pub code: String,
    /// Uid de correlação desta tentativa de login.
    pub uid: String,
}

/// Perfil do usuário retornado por `GET /user` com credencial bearer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Login da conta.
    pub login: String,
    /// Nome exibível, quando preenchido no perfil.
    #[serde(default)]
    pub name: Option<String>,
    /// URL do avatar.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Nome para exibição: `name` quando presente e não vazio, senão `login`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.login)
    }
}
