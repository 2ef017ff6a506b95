use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::allocation::{AllocationError, AllocationPlan};
use super::domain::{MatchRecord, NewMatch, RequestId, RequestStatus, SourceRef};
use super::repository::{LedgerTransaction, ReliefRepository, RepositoryError};
use crate::config::PartialMatchStatus;

/// A planned source that held fewer units at commit time than during ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StaleAdjustment {
    pub source: SourceRef,
    pub planned: u32,
    pub committed: u32,
}

/// What one ledger commit wrote.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub request_id: RequestId,
    pub matches: Vec<MatchRecord>,
    pub admin_quantity: u32,
    pub pledge_quantity: u32,
    pub total_matched: u32,
    pub request_quantity: u32,
    pub status: RequestStatus,
    pub adjustments: Vec<StaleAdjustment>,
}

impl LedgerReceipt {
    pub fn quantity_remaining(&self) -> u32 {
        self.request_quantity.saturating_sub(self.total_matched)
    }
}

/// Persists allocation plans as matches inside a single transaction.
pub struct LedgerWriter<R> {
    repository: Arc<R>,
    partial_status: PartialMatchStatus,
}

impl<R> LedgerWriter<R>
where
    R: ReliefRepository + 'static,
{
    pub fn new(repository: Arc<R>, partial_status: PartialMatchStatus) -> Self {
        Self {
            repository,
            partial_status,
        }
    }

    /// Commit a plan, re-reading each source under the transaction.
    ///
    /// Walks the plan's ranked sources in order, capping every assignment at the live
    /// availability. Units a drained source can no longer give are taken from the next
    /// ranked sources instead. A plan whose every source was drained is `NoSupply`.
    /// Nothing is written unless the whole walk succeeds.
    pub fn commit(&self, plan: &AllocationPlan) -> Result<LedgerReceipt, AllocationError> {
        let request_id = plan.request_id;
        let mut tx = self.repository.begin()?;

        let request = tx
            .request(request_id)?
            .ok_or(AllocationError::RequestNotFound(request_id))?;
        let already_matched = tx.active_matched_quantity(request_id)?;
        let live_need = request.quantity.saturating_sub(already_matched);
        if live_need == 0 {
            return Err(AllocationError::AlreadyFulfilled(request_id));
        }

        let planned: HashMap<SourceRef, u32> = plan
            .decisions
            .iter()
            .map(|decision| (decision.source, decision.quantity_assigned))
            .collect();

        let mut remaining = plan.total_assigned().min(live_need);
        let mut matches = Vec::new();
        let mut adjustments = Vec::new();
        let mut admin_quantity = 0;
        let mut pledge_quantity = 0;

        for candidate in &plan.ranked {
            if remaining == 0 {
                break;
            }
            let planned_quantity = planned.get(&candidate.source).copied().unwrap_or(0);

            let live = live_available(&mut *tx, candidate.source)?;
            if live < planned_quantity {
                warn!(
                    request_id = %request_id,
                    source = ?candidate.source,
                    planned = planned_quantity,
                    available = live,
                    "source drained concurrently; re-planning from live availability"
                );
                adjustments.push(StaleAdjustment {
                    source: candidate.source,
                    planned: planned_quantity,
                    committed: live.min(remaining),
                });
            }

            let assign = live.min(remaining);
            if assign == 0 {
                continue;
            }

            reserve(&mut *tx, candidate.source, assign)?;
            let record = tx.insert_match(NewMatch {
                request_id,
                pledge_id: candidate.source.pledge_id(),
                match_quantity: assign,
                match_type: plan.match_type,
            })?;

            if candidate.source.is_admin() {
                admin_quantity += assign;
            } else {
                pledge_quantity += assign;
            }
            remaining -= assign;
            matches.push(record);
        }

        if matches.is_empty() {
            if !adjustments.is_empty() {
                warn!(
                    request_id = %request_id,
                    stale_sources = adjustments.len(),
                    "every planned source was drained before commit"
                );
            }
            return Err(AllocationError::NoSupply(request_id));
        }

        let total_matched = tx.active_matched_quantity(request_id)?;
        let status = settled_status(
            self.partial_status,
            request.status,
            total_matched,
            request.quantity,
        );
        if status != request.status {
            tx.set_request_status(request_id, status)?;
        }

        tx.commit()?;

        info!(
            request_id = %request_id,
            match_type = plan.match_type.label(),
            matches = matches.len(),
            admin_quantity,
            pledge_quantity,
            total_matched,
            status = status.label(),
            "matches committed"
        );

        Ok(LedgerReceipt {
            request_id,
            matches,
            admin_quantity,
            pledge_quantity,
            total_matched,
            request_quantity: request.quantity,
            status,
            adjustments,
        })
    }
}

/// Request status implied by its active matched total.
///
/// Approved requests keep their status. Under `MarkMatched` any positive total counts
/// as matched; otherwise only a complete fill does.
pub(crate) fn settled_status(
    partial_status: PartialMatchStatus,
    current: RequestStatus,
    matched: u32,
    quantity: u32,
) -> RequestStatus {
    match current {
        RequestStatus::Approved => current,
        _ if matched >= quantity => RequestStatus::Matched,
        _ if matched > 0 && partial_status == PartialMatchStatus::MarkMatched => {
            RequestStatus::Matched
        }
        _ => RequestStatus::Pending,
    }
}

fn live_available<T: LedgerTransaction + ?Sized>(
    tx: &mut T,
    source: SourceRef,
) -> Result<u32, RepositoryError> {
    Ok(match source {
        SourceRef::Admin { item_id } => tx
            .admin_inventory(item_id)?
            .map(|stock| stock.quantity)
            .unwrap_or(0),
        SourceRef::Pledge { pledge_id } => tx
            .pledge(pledge_id)?
            .filter(|pledge| !pledge.canceled)
            .map(|pledge| pledge.available_quantity())
            .unwrap_or(0),
    })
}

fn reserve<T: LedgerTransaction + ?Sized>(
    tx: &mut T,
    source: SourceRef,
    quantity: u32,
) -> Result<(), RepositoryError> {
    match source {
        SourceRef::Admin { item_id } => {
            let mut stock = tx.admin_inventory(item_id)?.ok_or(RepositoryError::NotFound)?;
            stock.quantity = stock.quantity.checked_sub(quantity).ok_or_else(|| {
                RepositoryError::Constraint(format!("admin stock for item {item_id} exhausted"))
            })?;
            tx.save_admin_inventory(stock)
        }
        SourceRef::Pledge { pledge_id } => {
            let mut pledge = tx.pledge(pledge_id)?.ok_or(RepositoryError::NotFound)?;
            pledge.allocated_quantity += quantity;
            tx.save_pledge(pledge)
        }
    }
}
