// src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::verdict::{CompileReport, Verdict};

/// One submitted grading run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTask {
    /// Identifier of the unit the objective belongs to.
    pub unit: String,
    /// Which objective inside the unit is being graded.
    pub index: u32,
    /// Editable source fragments, in template order.
    pub code: Vec<String>,
}

impl ExecutionTask {
    pub fn new(unit: impl Into<String>, index: u32, code: Vec<String>) -> Self {
        Self {
            unit: unit.into(),
            index,
            code,
        }
    }

    pub(crate) fn request_body(&self) -> RunRequest<'_> {
        RunRequest {
            index: self.index,
            code: &self.code,
        }
    }
}

/// JSON body of the run endpoint.
#[derive(Serialize, Debug)]
pub struct RunRequest<'a> {
    pub index: u32,
    pub code: &'a [String],
}

/// Why the Evaluation Service refused to queue a run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub code: i64,
    pub category: String,
    pub id: String,
    pub message: String,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.category, self.id, self.message)
    }
}

/// Body sent instead of a stream when the run is rejected up front.
#[derive(Deserialize, Debug)]
pub(crate) struct RejectionEnvelope {
    #[serde(default)]
    pub ok: bool,
    pub reason: Option<Reason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub task_id: i64,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEvent {
    /// Taken from the header; `None` when the header did not carry it.
    pub task_id: Option<i64>,
    pub position: Option<i64>,
    /// One verdict per test point, in test-point order.
    pub results: Vec<Verdict>,
}

impl ResultEvent {
    /// Number of test points that were accepted.
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|v| v.is_accepted()).count()
    }

    /// True only for a non-empty block of accepted verdicts.
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(Verdict::is_accepted)
    }

    /// A failed compilation is reported as a block holding a single verdict.
    pub fn compile_error(&self) -> Option<&CompileReport> {
        match self.results.as_slice() {
            [Verdict::CompileError(report)] => Some(report),
            _ => None,
        }
    }
}

/// Everything a watch call ever hands to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Progress(ProgressEvent),
    Result(ResultEvent),
}

impl WatchEvent {
    pub fn task_id(&self) -> Option<i64> {
        match self {
            WatchEvent::Progress(p) => Some(p.task_id),
            WatchEvent::Result(r) => r.task_id,
        }
    }

    pub fn position(&self) -> Option<i64> {
        match self {
            WatchEvent::Progress(p) => Some(p.position),
            WatchEvent::Result(r) => r.position,
        }
    }
}
