use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::info;

use super::allocation::{
    AllocationEngine, AllocationError, AllocationPlan, InventoryPriority, MatchPolicy,
    RankingFallback,
};
use super::distance::DistanceService;
use super::domain::{CandidateSource, MatchId, MatchRecord, PledgeId, RequestId, RequestStatus};
use super::ledger::{LedgerReceipt, LedgerWriter};
use super::repository::{ReliefRepository, RepositoryError};
use super::resolver::SupplyResolver;
use super::shipping::{PledgeCancellation, ShipmentTracker, ShippingError, ShippingUpdate};
use crate::config::MatchingConfig;

/// Units committed per source kind in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceTotals {
    pub admin: u32,
    pub pledges: u32,
}

/// Outcome of an auto-match call.
#[derive(Debug, Clone, Serialize)]
pub struct AutoMatchSummary {
    pub request_id: RequestId,
    pub policy: MatchPolicy,
    pub ranking: Option<MatchPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_fallback: Option<RankingFallback>,
    pub matches_created: usize,
    pub quantity_assigned_by_source: SourceTotals,
    pub quantity_remaining: u32,
    pub status: RequestStatus,
    pub stale_sources: usize,
    pub matches: Vec<MatchRecord>,
}

/// Aggregate view of a request and its matches.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub quantity: u32,
    pub quantity_matched: u32,
    pub quantity_remaining: u32,
    pub status: &'static str,
    pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchTypeView {
    pub match_type_id: u8,
    pub name: &'static str,
    pub description: &'static str,
}

/// Service composing candidate resolution, policy ranking, and the match ledger.
pub struct ReliefMatchService<R, D> {
    repository: Arc<R>,
    resolver: SupplyResolver<R>,
    engine: AllocationEngine<D>,
    ledger: LedgerWriter<R>,
    shipments: ShipmentTracker<R>,
}

impl<R, D> ReliefMatchService<R, D>
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    pub fn new(
        repository: Arc<R>,
        distance: Arc<D>,
        config: MatchingConfig,
        distance_timeout: Duration,
    ) -> Self {
        Self {
            resolver: SupplyResolver::new(repository.clone()),
            engine: AllocationEngine::new(distance, distance_timeout),
            ledger: LedgerWriter::new(repository.clone(), config.partial_status),
            shipments: ShipmentTracker::new(repository.clone(), config.partial_status),
            repository,
        }
    }

    /// Auto-match entry point taking names as received from callers.
    ///
    /// Without a policy name the request's preferred policy is used, then `fulfillment`.
    pub async fn perform_auto_match(
        &self,
        request_id: RequestId,
        policy_name: Option<&str>,
        inventory_priority: Option<&str>,
    ) -> Result<AutoMatchSummary, MatchServiceError> {
        let policy = policy_name
            .map(str::parse::<MatchPolicy>)
            .transpose()?;
        let priority = inventory_priority
            .map(str::parse::<InventoryPriority>)
            .transpose()?
            .unwrap_or_default();

        self.run_auto_match(request_id, policy, priority, today())
            .await
    }

    pub async fn auto_match(
        &self,
        request_id: RequestId,
        policy: MatchPolicy,
        priority: InventoryPriority,
    ) -> Result<AutoMatchSummary, MatchServiceError> {
        self.run_auto_match(request_id, Some(policy), priority, today())
            .await
    }

    pub(crate) async fn run_auto_match(
        &self,
        request_id: RequestId,
        policy: Option<MatchPolicy>,
        priority: InventoryPriority,
        today: NaiveDate,
    ) -> Result<AutoMatchSummary, MatchServiceError> {
        let set = self.resolver.resolve(request_id, today)?;
        let policy = policy
            .or(set.request.preferred_policy)
            .unwrap_or(MatchPolicy::Fulfillment);

        let plan = self.engine.allocate(&set, policy, priority).await;
        let receipt = self.ledger.commit(&plan)?;

        info!(
            request_id = %request_id,
            policy = policy.label(),
            matches = receipt.matches.len(),
            remaining = receipt.quantity_remaining(),
            "auto-match finished"
        );

        Ok(AutoMatchSummary {
            request_id,
            policy,
            ranking: plan.ranking,
            ranking_fallback: plan.fallback,
            matches_created: receipt.matches.len(),
            quantity_assigned_by_source: SourceTotals {
                admin: receipt.admin_quantity,
                pledges: receipt.pledge_quantity,
            },
            quantity_remaining: receipt.quantity_remaining(),
            status: receipt.status,
            stale_sources: receipt.adjustments.len(),
            matches: receipt.matches,
        })
    }

    /// Match a specific pledge to a request through the same ledger path.
    pub fn create_manual_match(
        &self,
        request_id: RequestId,
        pledge_id: PledgeId,
        quantity: u32,
    ) -> Result<LedgerReceipt, MatchServiceError> {
        if quantity == 0 {
            return Err(AllocationError::InvalidQuantity.into());
        }

        let request = self
            .repository
            .request(request_id)?
            .ok_or(AllocationError::RequestNotFound(request_id))?;
        let pledge = self
            .repository
            .pledge(pledge_id)?
            .ok_or(AllocationError::PledgeNotFound(pledge_id))?;
        if pledge.item_id != request.item_id {
            return Err(AllocationError::ItemMismatch {
                request_id,
                pledge_id,
            }
            .into());
        }

        let candidate = CandidateSource::pledge(&pledge, pledge.usable_quantity(today()), None);
        let plan = AllocationPlan::manual(request_id, candidate, quantity);
        Ok(self.ledger.commit(&plan)?)
    }

    pub fn update_shipping_status(
        &self,
        match_id: MatchId,
        update: ShippingUpdate,
    ) -> Result<MatchRecord, MatchServiceError> {
        Ok(self.shipments.update_status(match_id, update)?)
    }

    pub fn match_details(&self, match_id: MatchId) -> Result<MatchRecord, MatchServiceError> {
        Ok(self.shipments.match_record(match_id)?)
    }

    pub fn cancel_match(&self, match_id: MatchId) -> Result<MatchRecord, MatchServiceError> {
        Ok(self.shipments.cancel_match(match_id)?)
    }

    pub fn cancel_pledge(
        &self,
        pledge_id: PledgeId,
    ) -> Result<PledgeCancellation, MatchServiceError> {
        Ok(self.shipments.cancel_pledge(pledge_id)?)
    }

    pub fn request_status(
        &self,
        request_id: RequestId,
    ) -> Result<RequestStatusView, MatchServiceError> {
        let request = self
            .repository
            .request(request_id)?
            .ok_or(AllocationError::RequestNotFound(request_id))?;
        let matches = self.repository.matches_for_request(request_id)?;
        let quantity_matched = matches
            .iter()
            .filter(|record| record.is_active())
            .map(|record| record.match_quantity)
            .sum();

        Ok(RequestStatusView {
            request_id,
            quantity: request.quantity,
            quantity_matched,
            quantity_remaining: request.quantity.saturating_sub(quantity_matched),
            status: request.status.label(),
            matches,
        })
    }

    pub fn auto_match_types(&self) -> Vec<MatchTypeView> {
        auto_match_types()
    }
}

/// Policies offered for auto-matching, with their persisted type ids.
pub fn auto_match_types() -> Vec<MatchTypeView> {
    MatchPolicy::ALL
        .iter()
        .map(|policy| MatchTypeView {
            match_type_id: policy.match_type().id(),
            name: policy.label(),
            description: policy.description(),
        })
        .collect()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Error raised by the relief match service.
#[derive(Debug, thiserror::Error)]
pub enum MatchServiceError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Shipping(#[from] ShippingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
