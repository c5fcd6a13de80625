//! State behind the interactive practice screen.

use std::ops::ControlFlow;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::api::SkillsApi;
use crate::attempt::{AttemptFlow, FlowError};
use crate::celebration::Celebration;
use crate::models::AttemptResponse;
use crate::runtime::AppEvent;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Practice,
    Guide,
}

#[derive(Debug)]
pub struct App {
    pub flow: AttemptFlow,
    pub state: AppState,
    /// Highlighted row in the error checklist
    pub cursor: usize,
    /// This user's earlier attempts at the task, oldest first
    pub history: Vec<AttemptResponse>,
    pub celebration: Celebration,
    session: Option<Session>,
    session_expired: bool,
    viewport: (u16, u16),
}

impl App {
    pub fn new(flow: AttemptFlow, session: Option<Session>, history: Vec<AttemptResponse>) -> Self {
        Self {
            flow,
            state: AppState::Practice,
            cursor: 0,
            history,
            celebration: Celebration::new(),
            session,
            session_expired: false,
            viewport: (80, 24),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Set once the server rejected the token during this run
    pub fn session_expired(&self) -> bool {
        self.session_expired
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
    }

    pub fn on_event(&mut self, event: AppEvent, api: &dyn SkillsApi) -> ControlFlow<()> {
        match event {
            AppEvent::Tick => {
                self.on_tick();
                ControlFlow::Continue(())
            }
            AppEvent::Resize => ControlFlow::Continue(()),
            AppEvent::Key(key) => self.on_key(key, api),
        }
    }

    pub fn on_tick(&mut self) {
        self.flow.tick();
        self.celebration.update();
    }

    pub fn on_key(&mut self, key: KeyEvent, api: &dyn SkillsApi) -> ControlFlow<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ControlFlow::Break(());
        }

        if self.state == AppState::Guide {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('g') | KeyCode::Char('b') | KeyCode::Backspace => {
                    self.state = AppState::Practice;
                    ControlFlow::Continue(())
                }
                KeyCode::Char('q') => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            };
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return ControlFlow::Break(()),
            KeyCode::Char(' ') | KeyCode::Char('s') => {
                if !self.flow.timer().is_running() {
                    self.celebration.stop();
                    self.flow.start();
                }
            }
            KeyCode::Enter => {
                let outcome = self
                    .flow
                    .stop_and_submit(api, self.session.as_ref())
                    .map(|r| r.clone());
                self.after_submit(outcome);
            }
            KeyCode::Char('r') => {
                let outcome = self
                    .flow
                    .submit(api, self.session.as_ref())
                    .map(|r| r.clone());
                self.after_submit(outcome);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.flow.error_types().len().saturating_sub(1);
                self.cursor = (self.cursor + 1).min(last);
            }
            KeyCode::Char('x') => {
                if let Some(id) = self.flow.error_types().get(self.cursor).map(|e| e.id) {
                    self.flow.toggle_error(id);
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.flow.cycle_standard(false),
            KeyCode::Right | KeyCode::Char('l') => self.flow.cycle_standard(true),
            KeyCode::Char('g') => self.state = AppState::Guide,
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn after_submit(&mut self, outcome: Result<AttemptResponse, FlowError>) {
        match outcome {
            Ok(response) => {
                if response.proficiency {
                    self.celebration.start(self.viewport.0, self.viewport.1);
                }
                self.history.push(response);
            }
            Err(FlowError::Submit(e)) if e.is_unauthorized() => {
                self.session = None;
                self.session_expired = true;
            }
            Err(_) => {}
        }
    }
}
