//! Binary-side helpers: exit mapping and terminal progress display.

pub(crate) mod exit_handler;
pub(crate) mod terminal_progress;
