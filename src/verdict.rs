// src/verdict.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::{Result, WatchError};

/// Resource usage reported for one executed test point.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecStats {
    pub exec_time: f64,
    pub exec_memory: u64,
    /// For a security error this is the offending system call number.
    pub syscall: i64,
    pub termsig: i32,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Mismatch {
    #[serde(flatten)]
    pub stats: ExecStats,
    pub got: String,
    pub expected: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub ok: bool,
    pub compiler: String,
    pub exit_code: i32,
    pub error: String,
}

/// Outcome of grading a single test point.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    InternalError(String),
    CompileError(CompileReport),
    WrongAnswer(Mismatch),
    Accepted(ExecStats),
    RuntimeError(ExecStats),
    TimeLimitExceeded(ExecStats),
    MemoryLimitExceeded(ExecStats),
    SecurityError(ExecStats),
}

impl Verdict {
    /// Wire discriminant, in `-3..=4`.
    pub fn code(&self) -> i64 {
        match self {
            Verdict::InternalError(_) => -3,
            Verdict::CompileError(_) => -2,
            Verdict::WrongAnswer(_) => -1,
            Verdict::Accepted(_) => 0,
            Verdict::RuntimeError(_) => 1,
            Verdict::TimeLimitExceeded(_) => 2,
            Verdict::MemoryLimitExceeded(_) => 3,
            Verdict::SecurityError(_) => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::InternalError(_) => "IE",
            Verdict::CompileError(_) => "CE",
            Verdict::WrongAnswer(_) => "WA",
            Verdict::Accepted(_) => "OK",
            Verdict::RuntimeError(_) => "RE",
            Verdict::TimeLimitExceeded(_) => "TLE",
            Verdict::MemoryLimitExceeded(_) => "MLE",
            Verdict::SecurityError(_) => "SE",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// Execution statistics, when the test point actually ran.
    pub fn stats(&self) -> Option<&ExecStats> {
        match self {
            Verdict::InternalError(_) | Verdict::CompileError(_) => None,
            Verdict::WrongAnswer(m) => Some(&m.stats),
            Verdict::Accepted(s)
            | Verdict::RuntimeError(s)
            | Verdict::TimeLimitExceeded(s)
            | Verdict::MemoryLimitExceeded(s)
            | Verdict::SecurityError(s) => Some(s),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::InternalError(message) => write!(f, "IE {}", message),
            Verdict::CompileError(report) => write!(
                f,
                "CE compiler \"{}\" exited with code {}",
                report.compiler, report.exit_code
            ),
            Verdict::WrongAnswer(m) => write!(
                f,
                "WA {}s {}KB, got {:?}, expected {:?}",
                m.stats.exec_time, m.stats.exec_memory, m.got, m.expected
            ),
            Verdict::SecurityError(s) => write!(
                f,
                "SE {}s {}KB, syscall {}",
                s.exec_time, s.exec_memory, s.syscall
            ),
            Verdict::Accepted(s)
            | Verdict::RuntimeError(s)
            | Verdict::TimeLimitExceeded(s)
            | Verdict::MemoryLimitExceeded(s) => write!(
                f,
                "{} {}s {}KB, signal {}",
                self.label(),
                s.exec_time,
                s.exec_memory,
                s.termsig
            ),
        }
    }
}

/// Decodes a result block: an array with one verdict record per test point.
pub fn decode_results(block: &Value) -> Result<Vec<Verdict>> {
    let items = block.as_array().ok_or_else(|| {
        WatchError::InvalidRecord(format!("result block is not an array: {}", block))
    })?;
    items.iter().map(decode_verdict).collect()
}

/// Decodes one verdict record.
///
/// The payload may sit next to `code` or be wrapped in a `data` member; both
/// layouts are produced by the Evaluation Service.
pub fn decode_verdict(record: &Value) -> Result<Verdict> {
    let code = record
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| WatchError::InvalidRecord(format!("verdict without integer code: {}", record)))?;
    let payload = record.get("data").unwrap_or(record);

    let verdict = match code {
        -3 => Verdict::InternalError(diagnostic(record, payload)?),
        -2 => Verdict::CompileError(payload_as(code, payload)?),
        -1 => Verdict::WrongAnswer(payload_as(code, payload)?),
        0 => Verdict::Accepted(payload_as(code, payload)?),
        1 => Verdict::RuntimeError(payload_as(code, payload)?),
        2 => Verdict::TimeLimitExceeded(payload_as(code, payload)?),
        3 => Verdict::MemoryLimitExceeded(payload_as(code, payload)?),
        4 => Verdict::SecurityError(payload_as(code, payload)?),
        other => return Err(WatchError::UnknownVerdict(other)),
    };
    Ok(verdict)
}

fn payload_as<'a, T: Deserialize<'a>>(code: i64, payload: &'a Value) -> Result<T> {
    T::deserialize(payload)
        .map_err(|e| WatchError::InvalidRecord(format!("verdict code {}: {}", code, e)))
}

fn diagnostic(record: &Value, payload: &Value) -> Result<String> {
    payload
        .as_str()
        .or_else(|| record.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| WatchError::InvalidRecord("internal error without diagnostic".to_string()))
}
