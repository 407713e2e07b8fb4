use std::str::FromStr;

use anyhow::{Error, anyhow};

/// What to do when the batch lookup of sender positions fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SenderLookupFailure {
    /// Treat every sender as having no progress. Peer messages stay visible.
    #[default]
    Degrade,
    /// Fail the whole request.
    Propagate,
}

impl FromStr for SenderLookupFailure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "propagate" => Ok(Self::Propagate),
            other => Err(anyhow!(
                "unknown sender lookup failure policy '{}' (expected degrade|propagate)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub sender_lookup_failure: SenderLookupFailure,
}
