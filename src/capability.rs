//! Capabilities that require provider selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DispatchError;

/// An axis of functionality served by interchangeable providers.
///
/// Each capability owns its own adapter list; capabilities never share
/// dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "captcha")]
    CaptchaSolve,
}

impl Capability {
    /// All known capabilities.
    pub const ALL: [Capability; 2] = [Capability::Search, Capability::CaptchaSolve];

    /// Returns the string identifier (`"search"` or `"captcha"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Search => "search",
            Capability::CaptchaSolve => "captcha",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(Capability::Search),
            "captcha" => Ok(Capability::CaptchaSolve),
            other => Err(DispatchError::UnknownCapability(other.to_string())),
        }
    }
}
