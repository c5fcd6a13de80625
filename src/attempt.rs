//! The attempt form: pick a standard, time the run, tag errors, submit.
//!
//! An [`AttemptFlow`] belongs to exactly one screen. It never touches the
//! network except in [`AttemptFlow::submit`], and it only does so once every
//! local precondition holds.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, SkillsApi, TaskDetail};
use crate::models::{
    AttemptCreate, AttemptErrorIn, AttemptResponse, ErrorType, Id, Severity, Task, TaskStandard,
};
use crate::session::Session;
use crate::timer::{AttemptTimer, Clock, TimerState};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Select a standard first")]
    NoStandard,
    #[error("Start the timer first")]
    NotStarted,
    #[error("Stop the timer before submitting")]
    NotStopped,
    #[error("You need to log in first.")]
    NotLoggedIn,
    #[error("Submission failed: {0}")]
    Submit(#[from] ApiError),
}

impl FlowError {
    /// Whether the request ever reached the server
    pub fn is_local(&self) -> bool {
        !matches!(self, FlowError::Submit(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(t) | Notice::Error(t) => t,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

/// Client-local attempt state for one task.
pub struct AttemptFlow {
    task: Task,
    standards: Vec<TaskStandard>,
    error_types: Vec<ErrorType>,
    standard_id: Option<Id>,
    selected_errors: Vec<Id>,
    timer: AttemptTimer,
    result: Option<AttemptResponse>,
    notice: Option<Notice>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AttemptFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptFlow")
            .field("task", &self.task.slug)
            .field("standard_id", &self.standard_id)
            .field("selected_errors", &self.selected_errors)
            .field("timer", &self.timer)
            .field("result", &self.result.as_ref().map(|r| r.id))
            .field("notice", &self.notice)
            .finish()
    }
}

impl AttemptFlow {
    pub fn new(
        task: Task,
        standards: Vec<TaskStandard>,
        error_types: Vec<ErrorType>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let standard_id = standards.first().map(|s| s.id);
        Self {
            task,
            standards,
            error_types,
            standard_id,
            selected_errors: Vec::new(),
            timer: AttemptTimer::new(),
            result: None,
            notice: None,
            clock,
        }
    }

    pub fn from_detail(detail: TaskDetail, clock: Arc<dyn Clock>) -> Self {
        Self::new(detail.task, detail.standards, detail.error_types, clock)
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn standards(&self) -> &[TaskStandard] {
        &self.standards
    }

    pub fn error_types(&self) -> &[ErrorType] {
        &self.error_types
    }

    pub fn timer(&self) -> &AttemptTimer {
        &self.timer
    }

    pub fn result(&self) -> Option<&AttemptResponse> {
        self.result.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn standard_id(&self) -> Option<Id> {
        self.standard_id
    }

    pub fn current_standard(&self) -> Option<&TaskStandard> {
        let id = self.standard_id?;
        self.standards.iter().find(|s| s.id == id)
    }

    pub fn select_standard(&mut self, id: Id) -> bool {
        if self.standards.iter().any(|s| s.id == id) {
            self.standard_id = Some(id);
            true
        } else {
            false
        }
    }

    pub fn clear_standard(&mut self) {
        self.standard_id = None;
    }

    /// Move to the next (or previous) standard, wrapping around.
    pub fn cycle_standard(&mut self, forward: bool) {
        if self.standards.is_empty() {
            return;
        }
        let len = self.standards.len();
        let idx = self
            .standard_id
            .and_then(|id| self.standards.iter().position(|s| s.id == id));
        let next = match (idx, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        };
        self.standard_id = Some(self.standards[next].id);
    }

    pub fn selected_errors(&self) -> &[Id] {
        &self.selected_errors
    }

    pub fn is_error_selected(&self, id: Id) -> bool {
        self.selected_errors.contains(&id)
    }

    /// Add or remove an error tag. Ids outside the vocabulary are refused.
    pub fn toggle_error(&mut self, id: Id) -> bool {
        if !self.error_types.iter().any(|e| e.id == id) {
            return false;
        }
        if let Some(pos) = self.selected_errors.iter().position(|&e| e == id) {
            self.selected_errors.remove(pos);
        } else {
            self.selected_errors.push(id);
        }
        true
    }

    /// Selected error count for one severity, for the standard card
    pub fn selected_count(&self, severity: Severity) -> usize {
        self.error_types
            .iter()
            .filter(|e| e.severity == severity && self.is_error_selected(e.id))
            .count()
    }

    pub fn start(&mut self) {
        let now = self.clock.now();
        self.timer.start(now);
        self.notice = Some(Notice::Info("Running...".to_string()));
    }

    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.timer.tick(now);
    }

    pub fn stop(&mut self) -> bool {
        let now = self.clock.now();
        self.timer.stop(now).is_some()
    }

    /// The request body for the current attempt, if it is complete.
    pub fn payload(&self) -> Result<AttemptCreate, FlowError> {
        let standard_id = self.standard_id.ok_or(FlowError::NoStandard)?;
        let (started_at, ended_at) = match (self.timer.started_at(), self.timer.ended_at()) {
            (None, _) => return Err(FlowError::NotStarted),
            (Some(_), None) => return Err(FlowError::NotStopped),
            (Some(s), Some(e)) => (s, e),
        };
        Ok(AttemptCreate {
            task_id: self.task.id,
            standard_id,
            started_at,
            ended_at,
            errors: self
                .selected_errors
                .iter()
                .map(|&error_type_id| AttemptErrorIn { error_type_id })
                .collect(),
        })
    }

    /// Send the stopped attempt. Local preconditions are checked first and
    /// short-circuit without any request. A failed request leaves the
    /// attempt exactly as it was so it can be retried.
    pub fn submit(
        &mut self,
        api: &dyn SkillsApi,
        session: Option<&Session>,
    ) -> Result<&AttemptResponse, FlowError> {
        let outcome = self.try_submit(api, session);
        match outcome {
            Ok(response) => {
                self.notice = Some(Notice::Info(format!(
                    "Score: {} | Proficiency: {}",
                    response.score,
                    if response.proficiency { "Yes" } else { "No" }
                )));
                self.selected_errors.clear();
                self.timer.reset();
                Ok(self.result.insert(response))
            }
            Err(e) => {
                self.notice = Some(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    fn try_submit(
        &self,
        api: &dyn SkillsApi,
        session: Option<&Session>,
    ) -> Result<AttemptResponse, FlowError> {
        let payload = self.payload()?;
        let token = session
            .filter(|s| s.has_token())
            .map(|s| s.token.as_str())
            .ok_or(FlowError::NotLoggedIn)?;
        match api.create_attempt(&payload, token) {
            Ok(response) => {
                info!(
                    task = %self.task.slug,
                    attempt = response.id,
                    score = response.score,
                    proficiency = response.proficiency,
                    "attempt submitted"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(task = %self.task.slug, error = %e, "attempt submission failed");
                Err(e.into())
            }
        }
    }

    /// The "Stop & Submit" action.
    pub fn stop_and_submit(
        &mut self,
        api: &dyn SkillsApi,
        session: Option<&Session>,
    ) -> Result<&AttemptResponse, FlowError> {
        if self.standard_id.is_none() {
            return self.reject(FlowError::NoStandard);
        }
        if self.timer.state() == TimerState::Idle {
            return self.reject(FlowError::NotStarted);
        }
        self.stop();
        self.submit(api, session)
    }

    fn reject(&mut self, err: FlowError) -> Result<&AttemptResponse, FlowError> {
        self.notice = Some(Notice::Error(err.to_string()));
        Err(err)
    }

    /// Throw away the in-progress attempt.
    pub fn reset(&mut self) {
        self.selected_errors.clear();
        self.timer.reset();
        self.notice = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeaderboardEntry, Profile, RegisterRequest, TokenResponse, UserSummary};
    use crate::api::ApiResult;
    use crate::timer::ManualClock;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    /// Records attempt posts and answers with a canned result
    struct RecordingApi {
        posts: Mutex<Vec<(AttemptCreate, String)>>,
        fail_with: Option<u16>,
    }

    impl RecordingApi {
        fn ok() -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
                fail_with: Some(status),
            }
        }

        fn post_count(&self) -> usize {
            self.posts.lock().unwrap().len()
        }
    }

    impl SkillsApi for RecordingApi {
        fn login(&self, _: &str, _: &str) -> ApiResult<TokenResponse> {
            unreachable!()
        }
        fn register(&self, _: &RegisterRequest) -> ApiResult<Profile> {
            unreachable!()
        }
        fn profile(&self, _: &str) -> ApiResult<Profile> {
            unreachable!()
        }
        fn tasks(&self, _: Option<&str>) -> ApiResult<Vec<Task>> {
            unreachable!()
        }
        fn task_by_slug(&self, _: &str, _: Option<&str>) -> ApiResult<Task> {
            unreachable!()
        }
        fn standards(&self, _: Id, _: Option<&str>) -> ApiResult<Vec<TaskStandard>> {
            unreachable!()
        }
        fn error_types(&self, _: Option<&str>) -> ApiResult<Vec<ErrorType>> {
            unreachable!()
        }
        fn create_attempt(&self, attempt: &AttemptCreate, token: &str) -> ApiResult<AttemptResponse> {
            self.posts
                .lock()
                .unwrap()
                .push((attempt.clone(), token.to_string()));
            if let Some(status) = self.fail_with {
                return Err(ApiError::Http {
                    status,
                    body: "boom".into(),
                });
            }
            Ok(AttemptResponse {
                id: 99,
                task_id: attempt.task_id,
                standard_id: attempt.standard_id,
                started_at: attempt.started_at,
                ended_at: attempt.ended_at,
                time_seconds: (attempt.ended_at - attempt.started_at).num_seconds(),
                score: 95,
                proficiency: true,
                errors: vec![],
            })
        }
        fn my_attempts(&self, _: &str) -> ApiResult<Vec<AttemptResponse>> {
            unreachable!()
        }
        fn summary(&self, _: &str) -> ApiResult<UserSummary> {
            unreachable!()
        }
        fn leaderboard(&self, _: Option<&str>) -> ApiResult<Vec<LeaderboardEntry>> {
            unreachable!()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn flow(clock: Arc<ManualClock>) -> AttemptFlow {
        let task = Task {
            id: 7,
            name: "Palm needle driver".into(),
            slug: "palm-needle-driver".into(),
            category: Some("Instrument handling".into()),
            description: None,
        };
        let standards = vec![
            TaskStandard {
                id: 11,
                level: "Novice".into(),
                target_time_seconds: 60,
                max_minor_errors: 1,
                max_major_errors: 0,
                consecutive_required: 1,
                objective_criteria: None,
            },
            TaskStandard {
                id: 12,
                level: "Expert".into(),
                target_time_seconds: 30,
                max_minor_errors: 0,
                max_major_errors: 0,
                consecutive_required: 3,
                objective_criteria: None,
            },
        ];
        let error_types = vec![
            ErrorType {
                id: 1,
                name: "Regrip".into(),
                description: None,
                severity: Severity::Minor,
            },
            ErrorType {
                id: 2,
                name: "Dropped needle".into(),
                description: None,
                severity: Severity::Major,
            },
        ];
        AttemptFlow::new(task, standards, error_types, clock)
    }

    fn session() -> Session {
        Session {
            token: "tok".into(),
            profile: None,
        }
    }

    #[test]
    fn first_standard_is_preselected() {
        let f = flow(Arc::new(ManualClock::new(t0())));
        assert_eq!(f.standard_id(), Some(11));
        assert_eq!(f.current_standard().unwrap().level, "Novice");
    }

    #[test]
    fn cycle_standard_wraps() {
        let mut f = flow(Arc::new(ManualClock::new(t0())));
        f.cycle_standard(true);
        assert_eq!(f.standard_id(), Some(12));
        f.cycle_standard(true);
        assert_eq!(f.standard_id(), Some(11));
        f.cycle_standard(false);
        assert_eq!(f.standard_id(), Some(12));
        assert!(!f.select_standard(404));
        assert_eq!(f.standard_id(), Some(12));
    }

    #[test]
    fn toggle_error_keeps_selection_order_and_rejects_unknown() {
        let mut f = flow(Arc::new(ManualClock::new(t0())));
        assert!(f.toggle_error(2));
        assert!(f.toggle_error(1));
        assert_eq!(f.selected_errors(), &[2, 1]);
        assert!(f.toggle_error(2));
        assert_eq!(f.selected_errors(), &[1]);
        assert!(!f.toggle_error(42));
        assert_eq!(f.selected_count(Severity::Minor), 1);
        assert_eq!(f.selected_count(Severity::Major), 0);
    }

    #[test]
    fn payload_requires_complete_timer() {
        let clock = Arc::new(ManualClock::new(t0()));
        let mut f = flow(clock.clone());
        assert_matches!(f.payload(), Err(FlowError::NotStarted));
        f.start();
        assert_matches!(f.payload(), Err(FlowError::NotStopped));
        clock.advance(Duration::seconds(45));
        f.stop();
        let payload = f.payload().unwrap();
        assert_eq!(payload.started_at, t0());
        assert_eq!(payload.ended_at, t0() + Duration::seconds(45));
    }

    #[test]
    fn missing_standard_blocks_without_request() {
        let clock = Arc::new(ManualClock::new(t0()));
        let api = RecordingApi::ok();
        let mut f = flow(clock.clone());
        f.clear_standard();
        f.start();
        clock.advance(Duration::seconds(5));

        let err = f.stop_and_submit(&api, Some(&session())).unwrap_err();
        assert_matches!(err, FlowError::NoStandard);
        assert_eq!(api.post_count(), 0);
        // the timer keeps running; nothing was stopped
        assert_eq!(f.timer().state(), TimerState::Running);
        assert_eq!(f.notice().unwrap().text(), "Select a standard first");
    }

    #[test]
    fn missing_token_blocks_without_request() {
        let clock = Arc::new(ManualClock::new(t0()));
        let api = RecordingApi::ok();
        let mut f = flow(clock.clone());
        f.start();
        clock.advance(Duration::seconds(10));

        let err = f.stop_and_submit(&api, None).unwrap_err();
        assert_matches!(err, FlowError::NotLoggedIn);
        assert_eq!(api.post_count(), 0);
        assert_eq!(f.notice().unwrap().text(), "You need to log in first.");

        let blank = Session {
            token: "".into(),
            profile: None,
        };
        assert_matches!(f.submit(&api, Some(&blank)), Err(FlowError::NotLoggedIn));
        assert_eq!(api.post_count(), 0);
    }

    #[test]
    fn success_resets_local_attempt() {
        let clock = Arc::new(ManualClock::new(t0()));
        let api = RecordingApi::ok();
        let mut f = flow(clock.clone());
        f.toggle_error(1);
        f.start();
        clock.advance(Duration::seconds(45));

        let res = f.stop_and_submit(&api, Some(&session())).unwrap();
        assert_eq!(res.id, 99);
        assert!(f.selected_errors().is_empty());
        assert_eq!(f.timer().state(), TimerState::Idle);
        assert_eq!(f.timer().elapsed_secs(), 0);
        assert_eq!(f.result().unwrap().score, 95);
        assert_eq!(f.notice().unwrap().text(), "Score: 95 | Proficiency: Yes");
        assert_eq!(api.post_count(), 1);
        assert_eq!(api.posts.lock().unwrap()[0].1, "tok");
    }

    #[test]
    fn failure_preserves_local_attempt_for_retry() {
        let clock = Arc::new(ManualClock::new(t0()));
        let api = RecordingApi::failing(500);
        let mut f = flow(clock.clone());
        f.toggle_error(2);
        f.start();
        clock.advance(Duration::seconds(20));

        let err = f.stop_and_submit(&api, Some(&session())).unwrap_err();
        assert_matches!(err, FlowError::Submit(ApiError::Http { status: 500, .. }));
        assert!(!err.is_local());
        let before = f.payload().unwrap();
        assert_eq!(f.selected_errors(), &[2]);
        assert_eq!(f.timer().state(), TimerState::Stopped);
        assert!(f.notice().unwrap().is_error());
        assert!(f.result().is_none());

        // a retry later sends identical timestamps
        clock.advance(Duration::seconds(60));
        let _ = f.submit(&api, Some(&session()));
        let posts = api.posts.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].0, before);
        assert_eq!(posts[1].0, before);
    }

    #[test]
    fn stop_before_start_is_rejected() {
        let api = RecordingApi::ok();
        let mut f = flow(Arc::new(ManualClock::new(t0())));
        assert_matches!(
            f.stop_and_submit(&api, Some(&session())),
            Err(FlowError::NotStarted)
        );
        assert_eq!(api.post_count(), 0);
    }

    #[test]
    fn new_result_replaces_previous() {
        let clock = Arc::new(ManualClock::new(t0()));
        let api = RecordingApi::ok();
        let mut f = flow(clock.clone());
        f.start();
        clock.advance(Duration::seconds(3));
        f.stop_and_submit(&api, Some(&session())).unwrap();
        let first_end = f.result().unwrap().ended_at;

        f.start();
        clock.advance(Duration::seconds(8));
        f.stop_and_submit(&api, Some(&session())).unwrap();
        assert!(f.result().unwrap().ended_at > first_end);
        assert_eq!(f.result().unwrap().time_seconds, 8);
    }

    #[test]
    fn reset_discards_attempt() {
        let clock = Arc::new(ManualClock::new(t0()));
        let mut f = flow(clock);
        f.toggle_error(1);
        f.start();
        f.reset();
        assert!(f.selected_errors().is_empty());
        assert_eq!(f.timer().state(), TimerState::Idle);
        assert!(f.notice().is_none());
    }
}
