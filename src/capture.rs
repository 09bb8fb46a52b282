//! Capture of the first root-level SELECT of a parse
//!
//! The gate is handed to the parser as its [`SelectHook`]. Once armed it
//! serializes the first SELECT it sees and ignores every later one; the
//! tree is only borrowed for the duration of the callback.

use tracing::{debug, trace};

use crate::config::DumpConfig;
use crate::error::DumpError;
use crate::json::select_to_json;
use crate::parser::ast::Select;
use crate::parser::grammar::{parse_with_hook, SelectHook};

#[derive(Debug, Clone, PartialEq, Eq)]
enum GateState {
    Disabled,
    Armed,
    Captured(String),
}

/// One-shot capture gate, disabled until armed
#[derive(Debug)]
pub struct CaptureGate {
    state: GateState,
    max_output: Option<usize>,
}

impl CaptureGate {
    pub fn new(config: &DumpConfig) -> Self {
        CaptureGate {
            state: GateState::Disabled,
            max_output: config.max_output,
        }
    }

    /// Accept the next SELECT, discarding any earlier capture
    pub fn arm(&mut self) {
        self.state = GateState::Armed;
    }

    pub fn is_captured(&self) -> bool {
        matches!(self.state, GateState::Captured(_))
    }

    /// The captured document, if a SELECT was seen while armed
    pub fn into_output(self) -> Option<String> {
        match self.state {
            GateState::Captured(json) => Some(json),
            GateState::Disabled | GateState::Armed => None,
        }
    }
}

impl SelectHook for CaptureGate {
    fn on_select(&mut self, select: &Select) {
        match self.state {
            GateState::Disabled => trace!("capture disabled, SELECT ignored"),
            GateState::Captured(_) => debug!("SELECT already captured, ignoring later statement"),
            GateState::Armed => {
                let json = select_to_json(select, self.max_output);
                debug!(bytes = json.len(), "captured SELECT");
                self.state = GateState::Captured(json);
            }
        }
    }
}

/// Parse the first statement of `sql` and render it as JSON if it is a
/// SELECT.
pub fn dump(sql: &str, config: &DumpConfig) -> Result<String, DumpError> {
    let mut gate = CaptureGate::new(config);
    gate.arm();

    let parsed = parse_with_hook(sql, &mut gate);
    match (gate.into_output(), parsed) {
        (Some(json), Ok(())) => Ok(json),
        (Some(json), Err(err)) => {
            debug!(%err, "ignoring parse error after capture");
            Ok(json)
        }
        (None, Err(err)) => Err(DumpError::Parse(err)),
        (None, Ok(())) => Err(DumpError::NoSelect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::Value;

    #[test]
    fn test_disabled_gate_ignores_selects() {
        let mut gate = CaptureGate::new(&DumpConfig::default());
        parse_with_hook("SELECT 1", &mut gate).unwrap();
        assert!(!gate.is_captured());
        assert_eq!(gate.into_output(), None);
    }

    #[test]
    fn test_captures_first_select_only() {
        let mut gate = CaptureGate::new(&DumpConfig::default());
        gate.arm();
        parse_with_hook("SELECT 1; SELECT 2", &mut gate).unwrap();
        assert!(gate.is_captured());

        let value: Value = serde_json::from_str(&gate.into_output().unwrap()).unwrap();
        assert_eq!(value["columns"][0]["expr"]["value"], 1);
    }

    #[test]
    fn test_dump_reads_first_statement_only() {
        let err = dump("CREATE TABLE t(a); SELECT a FROM t", &DumpConfig::default()).unwrap_err();
        assert!(matches!(err, DumpError::NoSelect));

        let json = dump("SELECT a FROM t; CREATE TABLE t(a)", &DumpConfig::default()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["from"][0]["name"], "t");
    }

    #[test]
    fn test_dump_document_starts_with_newline() {
        let json = dump("SELECT 1", &DumpConfig::default()).unwrap();
        assert!(json.starts_with("\n{\n  \"type\": \"select\""));
        assert!(json.ends_with("\n}"));
    }

    #[test]
    fn test_dump_no_select() {
        let err = dump("CREATE TABLE t(a)", &DumpConfig::default()).unwrap_err();
        assert!(matches!(err, DumpError::NoSelect));

        let err = dump("   ", &DumpConfig::default()).unwrap_err();
        assert!(matches!(err, DumpError::NoSelect));
    }

    #[test]
    fn test_dump_parse_error() {
        let err = dump("SELECT FROM", &DumpConfig::default()).unwrap_err();
        match err {
            DumpError::Parse(Error::Syntax { near, .. }) => assert_eq!(near, "FROM"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_dump_error_after_capture_is_ignored() {
        let json = dump("SELECT 1; SELECT FROM", &DumpConfig::default()).unwrap();
        assert!(serde_json::from_str::<Value>(&json).is_ok());
    }

    #[test]
    fn test_dump_bounded_output_is_valid_json() {
        let config = DumpConfig::new().with_max_output(Some(40));
        let json = dump("SELECT a, b, c FROM t WHERE a = 1", &config).unwrap();
        assert!(json.len() < 80);
        assert!(serde_json::from_str::<Value>(&json).is_ok());
    }
}
