//! Exit code logic for the reelfetch process.
//!
//! Single responsibility: map a finished run to the process exit outcome.

use std::process::ExitCode;

use reelfetch_core::FinalReport;

/// Process outcome reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The run finished, even if some items failed.
    Success,
    /// An unexpected error stopped the run.
    Failure,
    /// The user interrupted the run.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Determines the process exit outcome from the final report.
///
/// Failed items do not change the outcome; only an interrupt does.
pub(crate) fn determine_exit_outcome(report: &FinalReport) -> ProcessExit {
    if report.interrupted {
        ProcessExit::Interrupted
    } else {
        ProcessExit::Success
    }
}
