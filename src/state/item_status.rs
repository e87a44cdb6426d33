/// Processing status definitions for collected items
///
/// The collector only ever creates items as `Pending`; classification stages
/// downstream advance them.
use std::fmt;

/// Represents the processing status of a raw item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// Collected and waiting for downstream processing
    Pending,

    /// Picked up by a downstream worker
    Processing,

    /// Assigned to an event or topic
    Classified,

    /// Judged irrelevant by downstream filtering
    Noise,

    /// Downstream processing failed
    Error,
}

impl ItemStatus {
    /// Returns true if no further processing is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Classified | Self::Noise | Self::Error)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Classified => "classified",
            Self::Noise => "noise",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "classified" => Some(Self::Classified),
            "noise" => Some(Self::Noise),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// All statuses, in lifecycle order
    pub fn all() -> [ItemStatus; 5] {
        [
            Self::Pending,
            Self::Processing,
            Self::Classified,
            Self::Noise,
            Self::Error,
        ]
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
