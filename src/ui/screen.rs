use ratatui::Frame;

use crate::app::{App, AppState};
use crate::ui::{render_guide, render_practice};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Timer, standard picker, error checklist and last result
pub struct PracticeScreen;

impl Screen for PracticeScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_practice(app, f);
    }
}

/// Technique guide for the current task
pub struct GuideScreen;

impl Screen for GuideScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_guide(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Practice => Box::new(PracticeScreen),
        AppState::Guide => Box::new(GuideScreen),
    }
}
