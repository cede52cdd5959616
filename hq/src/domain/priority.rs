//! Priority levels for queued requests

use serde::{Deserialize, Serialize};

/// Position a request takes when pushed to the queue
///
/// There are two lanes, prioritary and normal. `First` does not open a third
/// lane: it places the request at the front of the prioritary lane, ahead of
/// everything already waiting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Front of the prioritary lane
    First,
    /// Back of the prioritary lane
    Prioritary,
    /// Back of the normal lane
    #[default]
    Normal,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Prioritary => write!(f, "prioritary"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "prioritary" => Ok(Self::Prioritary),
            "normal" => Ok(Self::Normal),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}
