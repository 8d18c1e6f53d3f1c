use serde::Serialize;

use super::Expression;
use crate::error::ValidationError;

/// A Log expression will log all packets that match the rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Log {
    pub group: Option<LogGroup>,
    pub prefix: Option<LogPrefix>,
}

impl Expression for Log {
    fn get_name() -> &'static str {
        "log"
    }
}

/// The NFLOG group that will be assigned to each log line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub struct LogGroup(pub u16);

/// A prefix that will get prepended to each log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LogPrefix(String);

impl LogPrefix {
    /// Creates a new LogPrefix from a String. Note that LogPrefix should not be more than 127
    /// characters long.
    pub fn new(prefix: &str) -> Result<Self, ValidationError> {
        if prefix.chars().count() > 127 {
            return Err(ValidationError::TooLongLogPrefix);
        }
        Ok(LogPrefix(prefix.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
