//! HTTP boundary to the training API.

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AttemptCreate, AttemptResponse, ErrorType, Id, LeaderboardEntry, Profile, RegisterRequest,
    Task, TaskStandard, TokenResponse, UserSummary,
};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response. Displays the body text when the server sent one.
    #[error("{}", http_message(.status, .body))]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from server: {0}")]
    Decode(#[from] serde_json::Error),
}

fn http_message(status: &u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("request failed with status {status}")
    } else {
        body.to_string()
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server rejected our credentials; the stored token is stale.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Every endpoint the clients consume. `token` is sent as a bearer token when
/// present.
pub trait SkillsApi: Send + Sync {
    fn login(&self, email: &str, password: &str) -> ApiResult<TokenResponse>;
    fn register(&self, request: &RegisterRequest) -> ApiResult<Profile>;
    fn profile(&self, token: &str) -> ApiResult<Profile>;
    fn tasks(&self, token: Option<&str>) -> ApiResult<Vec<Task>>;
    fn task_by_slug(&self, slug: &str, token: Option<&str>) -> ApiResult<Task>;
    fn standards(&self, task_id: Id, token: Option<&str>) -> ApiResult<Vec<TaskStandard>>;
    fn error_types(&self, token: Option<&str>) -> ApiResult<Vec<ErrorType>>;
    fn create_attempt(&self, attempt: &AttemptCreate, token: &str) -> ApiResult<AttemptResponse>;
    fn my_attempts(&self, token: &str) -> ApiResult<Vec<AttemptResponse>>;
    fn summary(&self, token: &str) -> ApiResult<UserSummary>;
    fn leaderboard(&self, token: Option<&str>) -> ApiResult<Vec<LeaderboardEntry>>;
}

/// Blocking reqwest implementation of [`SkillsApi`].
#[derive(Debug, Clone)]
pub struct HttpApi {
    base: String,
    client: Client,
}

impl HttpApi {
    pub fn new(base: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("surgitrack/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        debug!(
            method = method.as_str(),
            url = url.as_str(),
            authenticated = token.is_some(),
            "api request"
        );
        let req = self.client.request(method, url);
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ApiResult<T> {
        read_json(self.request(Method::GET, path, token).send()?)
    }
}

fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        debug!(status = status.as_u16(), "api request failed");
        return Err(ApiError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

impl SkillsApi for HttpApi {
    fn login(&self, email: &str, password: &str) -> ApiResult<TokenResponse> {
        let form = [("username", email), ("password", password)];
        read_json(
            self.request(Method::POST, "/auth/login", None)
                .form(&form)
                .send()?,
        )
    }

    fn register(&self, request: &RegisterRequest) -> ApiResult<Profile> {
        read_json(
            self.request(Method::POST, "/auth/register", None)
                .json(request)
                .send()?,
        )
    }

    fn profile(&self, token: &str) -> ApiResult<Profile> {
        self.get("/auth/me", Some(token))
    }

    fn tasks(&self, token: Option<&str>) -> ApiResult<Vec<Task>> {
        self.get("/tasks/", token)
    }

    fn task_by_slug(&self, slug: &str, token: Option<&str>) -> ApiResult<Task> {
        self.get(&format!("/tasks/{slug}"), token)
    }

    fn standards(&self, task_id: Id, token: Option<&str>) -> ApiResult<Vec<TaskStandard>> {
        self.get(&format!("/tasks/{task_id}/standards"), token)
    }

    fn error_types(&self, token: Option<&str>) -> ApiResult<Vec<ErrorType>> {
        self.get("/error-types/", token)
    }

    fn create_attempt(&self, attempt: &AttemptCreate, token: &str) -> ApiResult<AttemptResponse> {
        // Trailing slash avoids a redirect that would drop the POST body.
        read_json(
            self.request(Method::POST, "/attempts/", Some(token))
                .json(attempt)
                .send()?,
        )
    }

    fn my_attempts(&self, token: &str) -> ApiResult<Vec<AttemptResponse>> {
        self.get("/attempts/me", Some(token))
    }

    fn summary(&self, token: &str) -> ApiResult<UserSummary> {
        self.get("/attempts/me/summary", Some(token))
    }

    fn leaderboard(&self, token: Option<&str>) -> ApiResult<Vec<LeaderboardEntry>> {
        self.get("/leaderboard/global", token)
    }
}

/// Everything the practice screen needs for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetail {
    pub task: Task,
    pub standards: Vec<TaskStandard>,
    pub error_types: Vec<ErrorType>,
}

/// Resolve the task by slug, then fetch its standards and the error
/// vocabulary in parallel. Both must succeed.
pub fn load_task_detail(
    api: &dyn SkillsApi,
    slug: &str,
    token: Option<&str>,
) -> ApiResult<TaskDetail> {
    let task = api.task_by_slug(slug, token)?;
    let task_id = task.id;
    let (standards, error_types) = thread::scope(|s| {
        let standards = s.spawn(move || api.standards(task_id, token));
        let error_types = api.error_types(token);
        let standards = standards
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (standards, error_types)
    });
    Ok(TaskDetail {
        task,
        standards: standards?,
        error_types: error_types?,
    })
}
