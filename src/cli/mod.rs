mod args;
mod repl;
pub(crate) mod theme;

pub use args::CliArgs;
pub use repl::{ReplSettings, run_repl};
pub use theme::Theme;
