// Library surface shared by the command-line commands, the practice TUI and
// the integration tests. The binary in main.rs only wires these together.
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod attempt;
pub mod celebration;
pub mod config;
pub mod export;
pub mod guide;
pub mod logging;
pub mod models;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod ui;
pub mod util;
