// src/pairing.rs
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::Result;
use crate::models::{ProgressEvent, ResultEvent, WatchEvent};
use crate::verdict::decode_results;

/// A header announcing that the next record is this task's result block.
///
/// Headers are opaque: `id` and `pos` are kept only when they could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHeader {
    pub task_id: Option<i64>,
    pub position: Option<i64>,
}

impl PendingHeader {
    fn from_record(value: &Value) -> Self {
        Self {
            task_id: integer_field(value, "id"),
            position: integer_field(value, "pos"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingState {
    #[default]
    Idle,
    AwaitingResult(PendingHeader),
}

#[derive(Deserialize)]
struct PositionRecord {
    id: i64,
    pos: i64,
}

/// Turns decoded records into watch events.
///
/// A record seen while a header is pending is always taken as that header's
/// result block, whatever it looks like.
#[derive(Debug, Default)]
pub struct PairingMachine {
    state: PairingState,
}

impl PairingMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Parses one textual record and advances the machine.
    pub fn feed(&mut self, record: &str) -> Result<Option<WatchEvent>> {
        let value: Value = serde_json::from_str(record)?;
        self.feed_value(&value)
    }

    pub fn feed_value(&mut self, value: &Value) -> Result<Option<WatchEvent>> {
        match std::mem::take(&mut self.state) {
            PairingState::Idle => {
                if let Some(progress) = progress_record(value) {
                    return Ok(Some(WatchEvent::Progress(progress)));
                }
                let header = PendingHeader::from_record(value);
                debug!("Task {:?} left the queue, awaiting result block", header.task_id);
                self.state = PairingState::AwaitingResult(header);
                Ok(None)
            }
            PairingState::AwaitingResult(header) => {
                let results = decode_results(value)?;
                debug!("Task {:?} finished with {} verdicts", header.task_id, results.len());
                Ok(Some(WatchEvent::Result(ResultEvent {
                    task_id: header.task_id,
                    position: header.position,
                    results,
                })))
            }
        }
    }
}

/// An object with integer `id` and a non-negative integer `pos`.
fn progress_record(value: &Value) -> Option<ProgressEvent> {
    if !value.is_object() {
        return None;
    }
    let record = PositionRecord::deserialize(value).ok()?;
    (record.pos >= 0).then_some(ProgressEvent {
        task_id: record.id,
        position: record.pos,
    })
}

fn integer_field(value: &Value, key: &str) -> Option<i64> {
    let field = value.get(key)?;
    field.as_i64().or_else(|| {
        field
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{ExecStats, Verdict};

    const ACCEPTED_BLOCK: &str =
        r#"[{"code":0,"execTime":0.1,"execMemory":1000,"syscall":0,"termsig":0}]"#;

    #[test]
    fn test_progress_only() {
        let mut machine = PairingMachine::new();
        let event = machine.feed(r#"{"id":7,"pos":3}"#).unwrap();
        assert_eq!(
            event,
            Some(WatchEvent::Progress(ProgressEvent {
                task_id: 7,
                position: 3
            }))
        );
        assert_eq!(machine.state(), PairingState::Idle);
    }

    #[test]
    fn test_header_then_result() {
        let mut machine = PairingMachine::new();
        assert_eq!(machine.feed(r#"{"id":7,"pos":-1}"#).unwrap(), None);
        assert_eq!(
            machine.state(),
            PairingState::AwaitingResult(PendingHeader {
                task_id: Some(7),
                position: Some(-1)
            })
        );

        let event = machine.feed(ACCEPTED_BLOCK).unwrap();
        assert_eq!(
            event,
            Some(WatchEvent::Result(ResultEvent {
                task_id: Some(7),
                position: Some(-1),
                results: vec![Verdict::Accepted(ExecStats {
                    exec_time: 0.1,
                    exec_memory: 1000,
                    syscall: 0,
                    termsig: 0,
                })],
            }))
        );
        assert_eq!(machine.state(), PairingState::Idle);
    }

    #[test]
    fn test_progress_shape_after_header_is_taken_as_result() {
        let mut machine = PairingMachine::new();
        machine.feed(r#"{"id":7,"pos":-1}"#).unwrap();
        let err = machine.feed(r#"{"id":7,"pos":2}"#).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_progress_resumes_after_result() {
        let mut machine = PairingMachine::new();
        machine.feed(r#"{"id":1,"pos":-1}"#).unwrap();
        machine.feed("[]").unwrap();
        let event = machine.feed(r#"{"id":2,"pos":0}"#).unwrap();
        assert_eq!(event.and_then(|e| e.task_id()), Some(2));
    }

    #[test]
    fn test_malformed_json() {
        let mut machine = PairingMachine::new();
        assert!(machine.feed("{\"id\":").unwrap_err().is_decode());
        assert!(machine.feed("").unwrap_err().is_decode());
    }

    #[test]
    fn test_any_other_record_becomes_header() {
        let mut machine = PairingMachine::new();
        assert_eq!(machine.feed(r#"{"id":7}"#).unwrap(), None);
        let event = machine.feed("[]").unwrap();
        assert_eq!(
            event,
            Some(WatchEvent::Result(ResultEvent {
                task_id: Some(7),
                position: None,
                results: Vec::new(),
            }))
        );

        assert_eq!(machine.feed("[1,2]").unwrap(), None);
        assert_eq!(
            machine.state(),
            PairingState::AwaitingResult(PendingHeader {
                task_id: None,
                position: None
            })
        );
        machine.feed("[]").unwrap();

        assert_eq!(machine.feed(r#"{"id":7,"pos":-1.0}"#).unwrap(), None);
        assert_eq!(
            machine.state(),
            PairingState::AwaitingResult(PendingHeader {
                task_id: Some(7),
                position: Some(-1)
            })
        );
        machine.feed("[]").unwrap();

        assert_eq!(machine.feed(r#"{"id":"7","pos":2}"#).unwrap(), None);
        assert!(matches!(machine.state(), PairingState::AwaitingResult(_)));
    }
}
