use crate::store::keys;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape in which visible panels are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Topology {
    /// Side by side, resized by width.
    #[default]
    #[serde(rename = "horizontal")]
    LinearHorizontal,
    /// Stacked, resized by height.
    #[serde(rename = "vertical")]
    LinearVertical,
    #[serde(rename = "grid")]
    Grid,
}

impl Topology {
    pub const ALL: [Topology; 3] = [Self::LinearHorizontal, Self::LinearVertical, Self::Grid];

    /// Name used in persisted keys and values.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinearHorizontal => "horizontal",
            Self::LinearVertical => "vertical",
            Self::Grid => "grid",
        }
    }

    /// Key of this topology's persisted layout record.
    pub fn storage_key(self) -> String {
        format!("{}{}", keys::WRAPPER_SIZES_PREFIX, self.as_str())
    }

    pub fn is_linear(self) -> bool {
        !matches!(self, Self::Grid)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                format!("unknown topology '{s}' (expected horizontal, vertical or grid)")
            })
    }
}
