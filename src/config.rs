//! Dump configuration

use std::env;

use tracing::warn;

/// Environment variable holding the output capacity bound in bytes
pub const MAX_OUTPUT_ENV: &str = "ASTDUMP_MAX_OUTPUT";

/// Options for one dump request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpConfig {
    /// Capacity bound of the JSON writer; unbounded when `None`
    pub max_output: Option<usize>,
}

impl DumpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_output(mut self, max_output: Option<usize>) -> Self {
        self.max_output = max_output;
        self
    }

    /// Defaults overridden by `ASTDUMP_MAX_OUTPUT`.
    ///
    /// A value that is not a byte count is ignored.
    pub fn from_env() -> Self {
        let max_output = env::var(MAX_OUTPUT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .and_then(|value| parse_max_output(&value));
        DumpConfig { max_output }
    }
}

fn parse_max_output(value: &str) -> Option<usize> {
    match value.trim().parse::<usize>() {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!(value, %err, "ignoring invalid {}", MAX_OUTPUT_ENV);
            None
        }
    }
}
