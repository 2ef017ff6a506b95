use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::super::domain::MatchType;
use super::AllocationError;

/// Ranking strategy applied to the pledge pool before greedy assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Closest donors first, by zip-code distance to the recipient.
    Nearest,
    /// Fewest days to ship first.
    Quickest,
    /// Largest remaining availability first, minimizing the number of matches.
    Fulfillment,
}

impl MatchPolicy {
    pub const ALL: [MatchPolicy; 3] = [
        MatchPolicy::Nearest,
        MatchPolicy::Quickest,
        MatchPolicy::Fulfillment,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            MatchPolicy::Nearest => "nearest",
            MatchPolicy::Quickest => "quickest",
            MatchPolicy::Fulfillment => "fulfillment",
        }
    }

    pub const fn match_type(self) -> MatchType {
        match self {
            MatchPolicy::Nearest => MatchType::Nearest,
            MatchPolicy::Quickest => MatchType::Quickest,
            MatchPolicy::Fulfillment => MatchType::Fulfillment,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            MatchPolicy::Nearest => "Match donors closest to the recipient's zip code first",
            MatchPolicy::Quickest => "Match donors who can ship soonest first",
            MatchPolicy::Fulfillment => "Match the largest pledges first to minimize shipments",
        }
    }

    /// Donor-centric policies drain pledges before admin stock.
    pub const fn default_order(self) -> SourceOrder {
        match self {
            MatchPolicy::Nearest | MatchPolicy::Quickest => SourceOrder::PledgesFirst,
            MatchPolicy::Fulfillment => SourceOrder::AdminFirst,
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = AllocationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "quickest" => Ok(Self::Quickest),
            "fulfillment" => Ok(Self::Fulfillment),
            _ => Err(AllocationError::InvalidPolicy(value.to_string())),
        }
    }
}

/// Caller preference for splitting need between admin inventory and pledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPriority {
    Admin,
    Pledges,
    #[default]
    Auto,
}

impl InventoryPriority {
    pub fn resolve(self, policy: MatchPolicy) -> SourceOrder {
        match self {
            InventoryPriority::Admin => SourceOrder::AdminFirst,
            InventoryPriority::Pledges => SourceOrder::PledgesFirst,
            InventoryPriority::Auto => policy.default_order(),
        }
    }
}

impl FromStr for InventoryPriority {
    type Err = AllocationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "pledges" | "pledge" => Ok(Self::Pledges),
            "auto" | "" => Ok(Self::Auto),
            _ => Err(AllocationError::InvalidInventoryPriority(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrder {
    AdminFirst,
    PledgesFirst,
}
