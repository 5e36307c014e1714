use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method};

use super::error::GitHubError;
use super::types::{DispatchInputs, DispatchRequest, JobPage, RunJob, RunPage, UserProfile, WorkflowRun};

const API_URL: &str = "https://api.github.com";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

pub struct GitHubClient {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    api_token: Option<String>,
}

impl GitHubClient {
    pub fn new(owner: String, repo: String, api_token: Option<String>) -> Self {
        Self::with_base_url(owner, repo, api_token, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        owner: String,
        repo: String,
        api_token: Option<String>,
        base_url: String,
    ) -> Self {
        let client = Client::builder()
            .user_agent(concat!("papergate/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url,
            owner,
            repo,
            api_token,
        }
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{tail}",
            self.base_url, self.owner, self.repo
        )
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header("accept", ACCEPT)
            .header("x-github-api-version", API_VERSION);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Trigger a run of the login workflow with `{code, uid}` as inputs.
    pub async fn dispatch_workflow(
        &self,
        workflow: &str,
        git_ref: &str,
        code: &str,
        uid: &str,
    ) -> Result<(), GitHubError> {
        let url = self.repo_url(&format!("actions/workflows/{workflow}/dispatches"));
        let body = DispatchRequest {
            git_ref: git_ref.to_string(),
            inputs: DispatchInputs {
                code: code.to_string(),
                uid: uid.to_string(),
            },
        };
        let response = self
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// List workflow runs created at or after `since`, newest first.
    pub async fn list_runs_created_after(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkflowRun>, GitHubError> {
        let url = self.repo_url("actions/runs");
        let created = format!(">={}", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        let response = self
            .request(Method::GET, &url)
            .query(&[("created", created.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;
        let page = response.json::<RunPage>().await?;
        Ok(page.workflow_runs)
    }

    /// List the jobs of a run by following its `jobs_url`.
    pub async fn list_jobs(&self, run: &WorkflowRun) -> Result<Vec<RunJob>, GitHubError> {
        let response = self.request(Method::GET, &run.jobs_url).send().await?;
        let response = check_status(response).await?;
        let page = response.json::<JobPage>().await?;
        Ok(page.jobs)
    }

    /// Download the run's log bundle as raw zip bytes.
    pub async fn download_run_logs(&self, run_id: u64) -> Result<Vec<u8>, GitHubError> {
        let url = self.repo_url(&format!("actions/runs/{run_id}/logs"));
        let response = self.request(Method::GET, &url).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch the profile of the user the `token` belongs to.
    ///
    /// The token here is the credential recovered from the run logs, not the
    /// client's API token.
    pub async fn get_user(&self, token: &str) -> Result<UserProfile, GitHubError> {
        let url = format!("{}/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("accept", ACCEPT)
            .header("x-github-api-version", API_VERSION)
            .bearer_auth(token)
            .send()
            .await?;
        let response = check_status(response).await?;
        let user = response.json::<UserProfile>().await?;
        Ok(user)
    }
}

/// Map non-success responses onto [`GitHubError`], preferring the `message`
/// field of the error payload when the body is JSON.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(1000);
        return Err(GitHubError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        return Err(GitHubError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}
