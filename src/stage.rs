// SPDX-License-Identifier: MIT
//! Lifecycle stages attached to every process log emission.
//!
//! A process (one request-handling operation such as `getAllProducts`) reports
//! a [`Stage::Start`], zero or more [`Stage::Warning`] checkpoints and then
//! exactly one terminal stage: [`Stage::Success`] or [`Stage::Exception`].
use std::fmt;

/// Lifecycle phase of a process being reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    Warning,
    Success,
    Exception,
}

impl Stage {
    /// Upper-case tag used as the message prefix (`"START: getAllProducts"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "START",
            Stage::Warning => "WARNING",
            Stage::Success => "SUCCESS",
            Stage::Exception => "EXCEPTION",
        }
    }

    /// Severity the sink and the local mirror use for this stage.
    pub fn severity(self) -> Severity {
        match self {
            Stage::Start | Stage::Success => Severity::Information,
            Stage::Warning => Severity::Warning,
            Stage::Exception => Severity::Error,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level of a trace record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
