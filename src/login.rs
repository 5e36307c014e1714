use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;
use crate::flow::{
    AttemptOutcome, AttemptStatus, CompletionConfig, FailureKind, LoginAttempt, LoginAudit,
    LoginMachine, PollConfig, Stage, new_uid,
};
use crate::github::{GitHubClient, GitHubError, RunJob, UserProfile, WorkflowRun};
use crate::logs;

/// Receives stage changes from an in-flight login attempt.
///
/// The flow never touches the terminal itself; the CLI's progress spinner
/// implements this and renders the transitions.
pub trait StageSink: Send + Sync {
    fn stage_changed(&self, stage: Stage);
}

/// Sink that ignores every stage change.
pub struct NullSink;

impl StageSink for NullSink {
    fn stage_changed(&self, _stage: Stage) {}
}

/// Everything the flow needs besides the API client.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Workflow file dispatched to start a login run.
    pub workflow: String,
    /// Ref the workflow runs on.
    pub git_ref: String,
    /// Archive entry holding the result step output.
    pub result_log: String,
    /// Bounds for the run-location poll.
    pub find: PollConfig,
    /// Bounds for the completion wait.
    pub completion: CompletionConfig,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            workflow: "login.yml".to_string(),
            git_ref: "main".to_string(),
            result_log: logs::RESULT_LOG_ENTRY.to_string(),
            find: PollConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

/// A fully authenticated session produced by a successful attempt.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: String,
    pub user: UserProfile,
    pub audit: LoginAudit,
}

/// Drives login attempts through the four-stage bridge.
///
/// One instance serializes its attempts: a second `login` call while one is
/// in flight is rejected instead of racing the first on the stored session.
pub struct LoginFlow {
    client: GitHubClient,
    options: FlowOptions,
    in_flight: AtomicBool,
}

impl LoginFlow {
    pub fn new(client: GitHubClient, options: FlowOptions) -> Self {
        Self {
            client,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one login attempt end to end.
    ///
    /// `code` is the external authorization code forwarded to the workflow;
    /// `uid` overrides the per-attempt random correlation id. Cancelling the
    /// token makes every pending delay and poll return
    /// [`AuthError::Cancelled`]. Nothing is persisted here: the caller
    /// stores the credential, so a failed attempt can never leave partial
    /// state behind.
    pub async fn login(
        &self,
        code: &str,
        uid: Option<String>,
        cancel: &CancellationToken,
        sink: &dyn StageSink,
    ) -> Result<Authenticated, AuthError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(AuthError::LoginInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let uid = uid.unwrap_or_else(new_uid);
        let mut attempt = LoginAttempt::new(uid);
        attempt.status = AttemptStatus::InProgress;
        // Runs are filtered by creation time; allow a little clock skew
        // between this host and the remote service.
        let since = attempt.created_at - chrono::Duration::minutes(2);

        match self.stages(&mut attempt, code, since, cancel, sink).await {
            Ok((token, user)) => Ok(Authenticated {
                token,
                user,
                audit: LoginAudit::from_attempt(&attempt),
            }),
            Err(err) => {
                LoginMachine::next(&mut attempt, AttemptOutcome::Failure(failure_kind(&err)));
                Err(err)
            }
        }
    }

    /// DISPATCHED → LOCATED → COMPLETED → AUTHENTICATED, bailing on the
    /// first stage error.
    async fn stages(
        &self,
        attempt: &mut LoginAttempt,
        code: &str,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
        sink: &dyn StageSink,
    ) -> Result<(String, UserProfile), AuthError> {
        // DISPATCHED: trigger the remote workflow run.
        sink.stage_changed(attempt.stage);
        self.client
            .dispatch_workflow(&self.options.workflow, &self.options.git_ref, code, &attempt.uid)
            .await
            .map_err(dispatch_error)?;
        LoginMachine::next(attempt, AttemptOutcome::Success);

        // LOCATED: bounded polling search for the run carrying the uid step.
        sink.stage_changed(attempt.stage);
        let (run, job_name) = self.find_run(&attempt.uid, since, cancel).await?;
        LoginMachine::next(attempt, AttemptOutcome::Success);

        // COMPLETED: wait out the run, then recover the token and the
        // profile. A run that did not conclude with success never gets its
        // logs fetched.
        sink.stage_changed(attempt.stage);
        let job = self.wait_for_completion(&run, &job_name, cancel).await?;
        if job.conclusion.as_deref() != Some("success") {
            return Err(AuthError::WorkflowFailed {
                conclusion: job.conclusion.unwrap_or_else(|| "unknown".to_string()),
            });
        }
        let token = self.fetch_token(run.id).await?;
        let user = self
            .client
            .get_user(&token)
            .await
            .map_err(AuthError::ProfileFetch)?;
        LoginMachine::next(attempt, AttemptOutcome::Success);
        sink.stage_changed(attempt.stage);

        Ok((token, user))
    }

    /// Locate the run whose job carries a step literally named `uid`.
    ///
    /// The uid-to-run association is not queryable directly, so each pass
    /// lists recent runs and their jobs. Exactly one run may match: more
    /// than one in the same pass is ambiguous, and an exhausted poll is a
    /// timeout, not proof that no run exists.
    async fn find_run(
        &self,
        uid: &str,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(WorkflowRun, String), AuthError> {
        let policy = &self.options.find;
        for pass in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(AuthError::Cancelled);
            }

            let runs = self.client.list_runs_created_after(since).await?;
            let mut matches = Vec::new();
            for run in runs {
                let jobs = self.client.list_jobs(&run).await?;
                let matched = jobs
                    .iter()
                    .find(|job| job.steps.iter().any(|step| step.name == uid));
                if let Some(job) = matched {
                    matches.push((run, job.name.clone()));
                }
            }

            match matches.len() {
                0 => {}
                1 => return Ok(matches.remove(0)),
                count => {
                    return Err(AuthError::AmbiguousRun {
                        uid: uid.to_string(),
                        count,
                    });
                }
            }

            if pass < policy.max_attempts {
                pause(policy.interval(), cancel).await?;
            }
        }

        Err(AuthError::RunNotFound {
            uid: uid.to_string(),
            attempts: policy.max_attempts,
        })
    }

    /// Poll the run's jobs until the named job completes, then settle so
    /// log artifacts become available. Bounded by the completion ceiling.
    async fn wait_for_completion(
        &self,
        run: &WorkflowRun,
        job_name: &str,
        cancel: &CancellationToken,
    ) -> Result<RunJob, AuthError> {
        let config = &self.options.completion;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(config.timeout_ms);

        loop {
            if cancel.is_cancelled() {
                return Err(AuthError::Cancelled);
            }

            let jobs = self.client.list_jobs(run).await?;
            let done = jobs
                .into_iter()
                .find(|job| job.name == job_name && job.status == "completed");
            if let Some(job) = done {
                pause(config.settle(), cancel).await?;
                return Ok(job);
            }

            if tokio::time::Instant::now() + config.interval() >= deadline {
                return Err(AuthError::JobTimeout {
                    job: job_name.to_string(),
                    waited_ms: config.timeout_ms,
                });
            }
            pause(config.interval(), cancel).await?;
        }
    }

    /// Download the run's log bundle and decode the embedded token.
    async fn fetch_token(&self, run_id: u64) -> Result<String, AuthError> {
        let archive = self.client.download_run_logs(run_id).await?;
        let text = logs::entry_text(&archive, &self.options.result_log)?;
        logs::extract_token(&text).ok_or(AuthError::TokenExtractionFailed)
    }
}

/// Resets the in-flight flag when the attempt ends, early returns included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sleep that resolves early with `Cancelled` when the token fires.
async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), AuthError> {
    tokio::select! {
        () = cancel.cancelled() => Err(AuthError::Cancelled),
        () = sleep(duration) => Ok(()),
    }
}

/// Dispatch rejections surface the remote payload message directly.
fn dispatch_error(err: GitHubError) -> AuthError {
    match err {
        GitHubError::ApiError { message, .. } => AuthError::Dispatch(message),
        other => AuthError::Api(other),
    }
}

/// Classify a stage error for the attempt's terminal failure record.
fn failure_kind(err: &AuthError) -> FailureKind {
    match err {
        AuthError::Dispatch(_)
        | AuthError::WorkflowFailed { .. }
        | AuthError::TokenExtractionFailed
        | AuthError::ProfileFetch(_) => FailureKind::Auth(err.to_string()),
        _ => FailureKind::System(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    use base64::prelude::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn fast_options() -> FlowOptions {
        FlowOptions {
            find: PollConfig {
                max_attempts: 3,
                interval_ms: 10,
            },
            completion: CompletionConfig {
                interval_ms: 10,
                timeout_ms: 500,
                settle_ms: 0,
            },
            ..FlowOptions::default()
        }
    }

    fn flow_for(server: &MockServer, options: FlowOptions) -> LoginFlow {
        let client = GitHubClient::with_base_url(
            "paperclub".into(),
            "site".into(),
            None,
            server.uri(),
        );
        LoginFlow::new(client, options)
    }

    fn runs_body(server_uri: &str, ids: &[u64]) -> serde_json::Value {
        let runs: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "jobs_url": format!("{server_uri}/repos/paperclub/site/actions/runs/{id}/jobs"),
                    "status": "in_progress"
                })
            })
            .collect();
        json!({"total_count": runs.len(), "workflow_runs": runs})
    }

    fn jobs_body(run_id: u64, status: &str, conclusion: Option<&str>, step: &str) -> serde_json::Value {
        json!({
            "total_count": 1,
            "jobs": [{
                "id": run_id * 10,
                "run_id": run_id,
                "name": "login",
                "status": status,
                "conclusion": conclusion,
                "steps": [
                    {"name": "Set up job", "number": 1},
                    {"name": step, "number": 2},
                    {"name": "Result", "number": 3}
                ]
            }]
        })
    }

    fn result_archive(token_plain: &str) -> Vec<u8> {
        let encoded = BASE64_STANDARD.encode(token_plain);
        let mut buf = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut buf);
        writer
            .start_file("login/3_Result.txt", SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(format!("result step output\n{{\"token\":\"{encoded}\"}}\n").as_bytes())
            .unwrap();
        writer.finish().unwrap();
        buf.into_inner()
    }

    async fn mount_dispatch(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(
                "/repos/paperclub/site/actions/workflows/login.yml/dispatches",
            ))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn end_to_end_success() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(42, "completed", Some("success"), "abc123")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(result_archive("ghp_xyz")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghp_xyz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"login": "octocat", "name": "The Octocat"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let auth = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap();

        // Token and user are mutually consistent: the profile came from the
        // exact token recovered from the logs.
        assert_eq!(auth.token, "ghp_xyz");
        assert_eq!(auth.user.login, "octocat");
        assert_eq!(auth.audit.uid, "abc123");
        assert_eq!(auth.audit.status, AttemptStatus::Authenticated);
        assert_eq!(
            auth.audit.stage_transitions,
            vec![
                Stage::Dispatched,
                Stage::Located,
                Stage::Completed,
                Stage::Authenticated
            ]
        );
    }

    #[tokio::test]
    async fn failed_conclusion_never_fetches_logs() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(42, "completed", Some("failure"), "abc123")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/logs"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        match err {
            AuthError::WorkflowFailed { conclusion } => assert_eq!(conclusion, "failure"),
            other => panic!("expected WorkflowFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_search_is_run_not_found() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"total_count": 0, "workflow_runs": []})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let options = FlowOptions {
            find: PollConfig {
                max_attempts: 2,
                interval_ms: 10,
            },
            ..fast_options()
        };
        let flow = flow_for(&server, options);
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        match err {
            AuthError::RunNotFound { uid, attempts } => {
                assert_eq!(uid, "abc123");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected RunNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_without_uid_step_never_matches() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        // The run exists but its steps carry a different uid.
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(42, "completed", Some("success"), "other-uid")),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::RunNotFound { .. }));
    }

    #[tokio::test]
    async fn two_matching_runs_are_ambiguous() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42, 43])),
            )
            .mount(&server)
            .await;
        for id in [42u64, 43] {
            Mock::given(method("GET"))
                .and(path(format!("/repos/paperclub/site/actions/runs/{id}/jobs")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(jobs_body(id, "completed", Some("success"), "abc123")),
                )
                .mount(&server)
                .await;
        }

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        match err {
            AuthError::AmbiguousRun { uid, count } => {
                assert_eq!(uid, "abc123");
                assert_eq!(count, 2);
            }
            other => panic!("expected AmbiguousRun, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stuck_job_hits_completion_ceiling() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        // The job carries the uid step but never completes.
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(jobs_body(42, "in_progress", None, "abc123")),
            )
            .mount(&server)
            .await;

        let options = FlowOptions {
            completion: CompletionConfig {
                interval_ms: 10,
                timeout_ms: 60,
                settle_ms: 0,
            },
            ..fast_options()
        };
        let flow = flow_for(&server, options);
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        match err {
            AuthError::JobTimeout { job, .. } => assert_eq!(job, "login"),
            other => panic!("expected JobTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_rejection_fails_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/repos/paperclub/site/actions/workflows/login.yml/dispatches",
            ))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "No ref found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", None, &cancel, &NullSink)
            .await
            .unwrap_err();

        match err {
            AuthError::Dispatch(message) => assert_eq!(message, "No ref found"),
            other => panic!("expected Dispatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn log_without_token_fragment_fails_extraction() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(42, "completed", Some("success"), "abc123")),
            )
            .mount(&server)
            .await;

        let mut buf = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut buf);
        writer
            .start_file("login/3_Result.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"no credential here").unwrap();
        writer.finish().unwrap();
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(buf.into_inner()))
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::TokenExtractionFailed));
    }

    #[tokio::test]
    async fn missing_result_entry_is_log_file_not_found() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(42, "completed", Some("success"), "abc123")),
            )
            .mount(&server)
            .await;

        let mut buf = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut buf);
        writer
            .start_file("login/1_Set up job.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"setup noise").unwrap();
        writer.finish().unwrap();
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(buf.into_inner()))
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        match err {
            AuthError::LogFileNotFound { entry } => assert_eq!(entry, "login/3_Result.txt"),
            other => panic!("expected LogFileNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_profile_fetch_fails_the_attempt() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(runs_body(&server.uri(), &[42])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jobs_body(42, "completed", Some("success"), "abc123")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs/42/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(result_archive("ghp_xyz")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server, fast_options());
        let cancel = CancellationToken::new();
        let err = flow
            .login("c0de", Some("abc123".into()), &cancel, &NullSink)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ProfileFetch(_)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_search() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"total_count": 0, "workflow_runs": []})),
            )
            .mount(&server)
            .await;

        let options = FlowOptions {
            find: PollConfig {
                max_attempts: 12,
                interval_ms: 5000,
            },
            ..fast_options()
        };
        let flow = flow_for(&server, options);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            flow.login("c0de", Some("abc123".into()), &cancel, &NullSink),
        )
        .await
        .expect("cancellation must resolve the flow promptly");

        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn concurrent_login_is_rejected() {
        let server = MockServer::start().await;
        mount_dispatch(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/paperclub/site/actions/runs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"total_count": 0, "workflow_runs": []})),
            )
            .mount(&server)
            .await;

        let options = FlowOptions {
            find: PollConfig {
                max_attempts: 12,
                interval_ms: 5000,
            },
            ..fast_options()
        };
        let flow = Arc::new(flow_for(&server, options));
        let cancel = CancellationToken::new();

        let first_flow = Arc::clone(&flow);
        let first_cancel = cancel.clone();
        let first = tokio::spawn(async move {
            first_flow
                .login("c0de", Some("abc123".into()), &first_cancel, &NullSink)
                .await
        });

        // Give the first attempt time to claim the flow.
        sleep(Duration::from_millis(50)).await;
        let second = flow.login("c0de", None, &cancel, &NullSink).await;
        assert!(matches!(second, Err(AuthError::LoginInProgress)));

        cancel.cancel();
        let first = first.await.unwrap();
        assert!(matches!(first, Err(AuthError::Cancelled)));

        // With the first attempt gone, the flow accepts a new login; a
        // pre-cancelled token keeps this from polling and shows the claim
        // got past the in-flight guard.
        let done = CancellationToken::new();
        done.cancel();
        let third = flow.login("c0de", Some("zzz".into()), &done, &NullSink).await;
        assert!(matches!(third, Err(AuthError::Cancelled)));
    }

    #[test]
    fn failure_kind_classification() {
        let auth = failure_kind(&AuthError::TokenExtractionFailed);
        assert!(matches!(auth, FailureKind::Auth(_)));

        let system = failure_kind(&AuthError::RunNotFound {
            uid: "abc123".into(),
            attempts: 12,
        });
        assert!(matches!(system, FailureKind::System(_)));
    }
}
