//! Relief auto-matching: candidate supply resolution, policy ranking, and the match
//! ledger that commits allocations against admin inventory and donor pledges.

pub mod allocation;
pub mod distance;
pub mod domain;
pub mod ledger;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod seed;
pub mod service;
pub mod shipping;
pub mod store;

#[cfg(test)]
mod tests;

pub use allocation::{
    AllocationDecision, AllocationEngine, AllocationError, AllocationPlan, InventoryPriority,
    MatchPolicy, RankingFallback, SourceOrder,
};
pub use distance::{DistanceError, DistanceService, ZipCodeBaseClient};
pub use domain::{
    AdminInventoryItem, CandidateSource, ItemId, MatchId, MatchRecord, MatchStatus, MatchType,
    Pledge, PledgeId, RequestId, RequestRecord, RequestStatus, ShippingStatus, SourceRef,
    UserAccount, UserId, UserRole,
};
pub use ledger::{LedgerReceipt, LedgerWriter, StaleAdjustment};
pub use repository::{LedgerTransaction, ReliefRepository, RepositoryError};
pub use resolver::{CandidateSet, SupplyResolver};
pub use router::matching_router;
pub use seed::{load_seed_dir, SeedError, SeedSummary};
pub use service::{
    auto_match_types, AutoMatchSummary, MatchServiceError, MatchTypeView, ReliefMatchService,
    RequestStatusView, SourceTotals,
};
pub use shipping::{PledgeCancellation, ShipmentTracker, ShippingError, ShippingUpdate};
pub use store::MemoryReliefStore;
