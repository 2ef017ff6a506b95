mod policy;
mod ranking;

pub use policy::{InventoryPriority, MatchPolicy, SourceOrder};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::distance::{DistanceError, DistanceService};
use super::domain::{CandidateSource, MatchType, PledgeId, RequestId, SourceRef};
use super::repository::RepositoryError;
use super::resolver::CandidateSet;

/// Quantity drawn from one source for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationDecision {
    pub source: SourceRef,
    pub quantity_assigned: u32,
}

/// Why a nearest-donor ranking degraded to fulfillment ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RankingFallback {
    DistanceServiceUnavailable(String),
    MissingDonorZip,
    MissingRecipientZip,
}

impl RankingFallback {
    pub fn summary(&self) -> String {
        match self {
            RankingFallback::DistanceServiceUnavailable(detail) => {
                format!("distance service unavailable: {detail}")
            }
            RankingFallback::MissingDonorZip => "a donor has no zip code".to_string(),
            RankingFallback::MissingRecipientZip => "recipient has no zip code".to_string(),
        }
    }
}

/// Ranked candidates plus the greedy decisions taken over them.
///
/// The ranked list is kept so the ledger can fall through to later sources when a
/// planned source turns out to have been drained concurrently.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationPlan {
    pub request_id: RequestId,
    pub quantity_needed: u32,
    pub match_type: MatchType,
    pub ranking: Option<MatchPolicy>,
    pub fallback: Option<RankingFallback>,
    pub ranked: Vec<CandidateSource>,
    pub decisions: Vec<AllocationDecision>,
}

impl AllocationPlan {
    /// Single-source plan for a hand-made match.
    pub fn manual(request_id: RequestId, candidate: CandidateSource, quantity: u32) -> Self {
        let decisions = ranking::assign_greedy(quantity, std::slice::from_ref(&candidate));
        Self {
            request_id,
            quantity_needed: quantity,
            match_type: MatchType::Manual,
            ranking: None,
            fallback: None,
            ranked: vec![candidate],
            decisions,
        }
    }

    pub fn total_assigned(&self) -> u32 {
        self.decisions
            .iter()
            .map(|decision| decision.quantity_assigned)
            .sum()
    }
}

/// Ranks supply candidates under a policy and assigns quantity greedily.
pub struct AllocationEngine<D> {
    distance: Arc<D>,
    distance_timeout: Duration,
}

impl<D> AllocationEngine<D>
where
    D: DistanceService + 'static,
{
    pub fn new(distance: Arc<D>, distance_timeout: Duration) -> Self {
        Self {
            distance,
            distance_timeout,
        }
    }

    pub async fn allocate(
        &self,
        set: &CandidateSet,
        policy: MatchPolicy,
        priority: InventoryPriority,
    ) -> AllocationPlan {
        let (admin, mut pool): (Vec<_>, Vec<_>) = set
            .candidates
            .iter()
            .cloned()
            .partition(|candidate| candidate.source.is_admin());

        let fallback = match policy {
            MatchPolicy::Fulfillment => {
                ranking::rank_by_fulfillment(&mut pool);
                None
            }
            MatchPolicy::Quickest => {
                ranking::rank_by_quickest(&mut pool);
                None
            }
            MatchPolicy::Nearest => self.rank_nearest(&mut pool, set.recipient_zip.as_deref()).await,
        };

        if let Some(reason) = &fallback {
            warn!(
                request_id = %set.request.id,
                reason = %reason.summary(),
                "nearest ranking unavailable; using fulfillment ranking"
            );
        }

        let order = priority.resolve(policy);
        let ranked: Vec<CandidateSource> = match order {
            SourceOrder::AdminFirst => admin.into_iter().chain(pool).collect(),
            SourceOrder::PledgesFirst => pool.into_iter().chain(admin).collect(),
        };

        let decisions = ranking::assign_greedy(set.quantity_needed, &ranked);

        debug!(
            request_id = %set.request.id,
            policy = policy.label(),
            ?order,
            candidates = ranked.len(),
            decisions = decisions.len(),
            "allocation planned"
        );

        AllocationPlan {
            request_id: set.request.id,
            quantity_needed: set.quantity_needed,
            match_type: policy.match_type(),
            ranking: Some(if fallback.is_some() {
                MatchPolicy::Fulfillment
            } else {
                policy
            }),
            fallback,
            ranked,
            decisions,
        }
    }

    async fn rank_nearest(
        &self,
        pool: &mut [CandidateSource],
        recipient_zip: Option<&str>,
    ) -> Option<RankingFallback> {
        if pool.is_empty() {
            return None;
        }

        let fallback = match recipient_zip {
            None => Some(RankingFallback::MissingRecipientZip),
            Some(_) if pool.iter().any(|c| c.donor_zipcode.is_none()) => {
                Some(RankingFallback::MissingDonorZip)
            }
            Some(origin) => {
                let zips: Vec<String> = pool
                    .iter()
                    .filter_map(|candidate| candidate.donor_zipcode.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();

                let lookup = self.distance.distances(origin, &zips);
                match tokio::time::timeout(self.distance_timeout, lookup)
                    .await
                    .unwrap_or(Err(DistanceError::Timeout))
                {
                    Ok(distances) => {
                        ranking::rank_by_distance(pool, &distances);
                        return None;
                    }
                    Err(err) => Some(RankingFallback::DistanceServiceUnavailable(err.to_string())),
                }
            }
        };

        ranking::rank_by_fulfillment(pool);
        fallback
    }
}

/// Failures surfaced by candidate resolution, allocation, and the ledger.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("request {0} not found")]
    RequestNotFound(RequestId),
    #[error("request {0} is already fulfilled")]
    AlreadyFulfilled(RequestId),
    #[error("no supply available for request {0}")]
    NoSupply(RequestId),
    #[error("unknown match policy '{0}'")]
    InvalidPolicy(String),
    #[error("unknown inventory priority '{0}'")]
    InvalidInventoryPriority(String),
    #[error("pledge {0} not found")]
    PledgeNotFound(PledgeId),
    #[error("pledge {pledge_id} does not offer the item requested by {request_id}")]
    ItemMismatch {
        request_id: RequestId,
        pledge_id: PledgeId,
    },
    #[error("match quantity must be positive")]
    InvalidQuantity,
    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
}

#[cfg(test)]
pub(crate) use ranking::{assign_greedy, rank_by_distance, rank_by_fulfillment, rank_by_quickest};
