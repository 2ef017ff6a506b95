use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier for an aid request raised by a recipient.
    RequestId
);
record_id!(
    /// Identifier for a donor pledge.
    PledgeId
);
record_id!(
    /// Identifier for a committed match between a request and a supply source.
    MatchId
);
record_id!(
    /// Catalog item identifier shared by requests, pledges, and admin inventory.
    ItemId
);
record_id!(
    /// Account identifier for donors, recipients, and administrators.
    UserId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Donor,
    Recipient,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Donor => "donor",
            UserRole::Recipient => "recipient",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "donor" => Some(Self::Donor),
            "recipient" => Some(Self::Recipient),
            _ => None,
        }
    }
}

/// Account details the matching workflow needs: role and shipping zip code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub role: UserRole,
    pub zip_code: Option<String>,
}

/// Lifecycle of an aid request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Matched,
    Approved,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Matched => "matched",
            RequestStatus::Approved => "approved",
        }
    }
}

/// Aid request as stored. The matched quantity is always derived from active matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub recipient_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
    pub status: RequestStatus,
    #[serde(default)]
    pub preferred_policy: Option<super::allocation::MatchPolicy>,
}

/// Donor supply unit, consumable across several matches.
///
/// `allocated_quantity + fulfilled_quantity` never exceeds `item_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pledge {
    pub id: PledgeId,
    pub donor_id: UserId,
    pub item_id: ItemId,
    pub item_quantity: u32,
    pub allocated_quantity: u32,
    pub fulfilled_quantity: u32,
    pub days_to_ship: Option<u32>,
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
    #[serde(default)]
    pub canceled: bool,
}

impl Pledge {
    pub fn available_quantity(&self) -> u32 {
        self.item_quantity
            .saturating_sub(self.allocated_quantity)
            .saturating_sub(self.fulfilled_quantity)
    }

    pub fn is_consistent(&self) -> bool {
        u64::from(self.allocated_quantity) + u64::from(self.fulfilled_quantity)
            <= u64::from(self.item_quantity)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_on.map(|date| date < today).unwrap_or(false)
    }

    /// Units that can still be committed to a new match.
    pub fn usable_quantity(&self, today: NaiveDate) -> u32 {
        if self.canceled || self.is_expired(today) {
            0
        } else {
            self.available_quantity()
        }
    }
}

/// Quantity held directly by the relief organization, with no donor attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminInventoryItem {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Persisted match type, one per policy plus hand-made matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Manual,
    Nearest,
    Quickest,
    Fulfillment,
}

impl MatchType {
    pub const fn id(self) -> u8 {
        match self {
            MatchType::Manual => 1,
            MatchType::Nearest => 2,
            MatchType::Quickest => 3,
            MatchType::Fulfillment => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MatchType::Manual => "manual",
            MatchType::Nearest => "nearest",
            MatchType::Quickest => "quickest",
            MatchType::Fulfillment => "fulfillment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Canceled,
}

/// Shipment progress for a match. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    Pending,
    Shipped,
    Delivered,
}

impl ShippingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ShippingStatus::Pending => "pending",
            ShippingStatus::Shipped => "shipped",
            ShippingStatus::Delivered => "delivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// Committed allocation of quantity from one source to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub request_id: RequestId,
    /// `None` when the units came from admin inventory.
    pub pledge_id: Option<PledgeId>,
    pub match_quantity: u32,
    pub match_status: MatchStatus,
    pub match_type: MatchType,
    pub canceled: bool,
    pub shipping_status: ShippingStatus,
    pub tracking_number: Option<String>,
    pub shipping_date: Option<NaiveDate>,
}

impl MatchRecord {
    pub fn is_active(&self) -> bool {
        !self.canceled
    }
}

/// Insert payload for the ledger; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub request_id: RequestId,
    pub pledge_id: Option<PledgeId>,
    pub match_quantity: u32,
    pub match_type: MatchType,
}

/// Which supply a candidate or decision draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    Admin { item_id: ItemId },
    Pledge { pledge_id: PledgeId },
}

impl SourceRef {
    pub fn pledge_id(&self) -> Option<PledgeId> {
        match self {
            SourceRef::Admin { .. } => None,
            SourceRef::Pledge { pledge_id } => Some(*pledge_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, SourceRef::Admin { .. })
    }
}

/// Transient view of a usable supply source, built fresh for each allocation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSource {
    pub source: SourceRef,
    pub available_quantity: u32,
    pub donor_zipcode: Option<String>,
    pub days_to_ship: Option<u32>,
}

impl CandidateSource {
    pub fn admin(item: &AdminInventoryItem) -> Self {
        Self {
            source: SourceRef::Admin {
                item_id: item.item_id,
            },
            available_quantity: item.quantity,
            donor_zipcode: None,
            days_to_ship: None,
        }
    }

    pub fn pledge(pledge: &Pledge, available_quantity: u32, donor_zipcode: Option<String>) -> Self {
        Self {
            source: SourceRef::Pledge {
                pledge_id: pledge.id,
            },
            available_quantity,
            donor_zipcode,
            days_to_ship: pledge.days_to_ship,
        }
    }
}
