use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    AdminInventoryItem, MatchId, MatchRecord, MatchStatus, PledgeId, ShippingStatus, UserRole,
};
use super::ledger::settled_status;
use super::repository::{LedgerTransaction, ReliefRepository, RepositoryError};
use crate::config::PartialMatchStatus;

/// Requested change to a match's shipment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShippingUpdate {
    pub shipping_status: ShippingStatus,
    pub actor_role: UserRole,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_date: Option<NaiveDate>,
}

/// Result of withdrawing a pledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PledgeCancellation {
    pub pledge_id: PledgeId,
    pub canceled_matches: Vec<MatchId>,
    pub released_quantity: u32,
}

/// Moves matches through shipping and cancellation while keeping pledge counters whole.
pub struct ShipmentTracker<R> {
    repository: Arc<R>,
    partial_status: PartialMatchStatus,
}

impl<R> ShipmentTracker<R>
where
    R: ReliefRepository + 'static,
{
    pub fn new(repository: Arc<R>, partial_status: PartialMatchStatus) -> Self {
        Self {
            repository,
            partial_status,
        }
    }

    pub fn match_record(&self, match_id: MatchId) -> Result<MatchRecord, ShippingError> {
        self.repository
            .match_record(match_id)?
            .ok_or(ShippingError::MatchNotFound(match_id))
    }

    /// Advance a shipment. Units leave the pledge's allocated bucket for the fulfilled
    /// bucket the first time the match leaves `pending`.
    pub fn update_status(
        &self,
        match_id: MatchId,
        update: ShippingUpdate,
    ) -> Result<MatchRecord, ShippingError> {
        let target = update.shipping_status;
        if target == ShippingStatus::Delivered {
            match update.actor_role {
                UserRole::Donor => {
                    return Err(ShippingError::Forbidden(
                        "donors can only mark items as shipped",
                    ))
                }
                UserRole::Admin | UserRole::Recipient => {}
            }
        }

        let mut tx = self.repository.begin()?;
        let mut record = tx
            .match_record(match_id)?
            .ok_or(ShippingError::MatchNotFound(match_id))?;

        if record.canceled {
            return Err(ShippingError::MatchCanceled(match_id));
        }
        if target < record.shipping_status {
            return Err(ShippingError::InvalidTransition {
                from: record.shipping_status,
                to: target,
            });
        }

        if record.shipping_status == ShippingStatus::Pending && target != ShippingStatus::Pending {
            if let Some(pledge_id) = record.pledge_id {
                let mut pledge = tx
                    .pledge(pledge_id)?
                    .ok_or(ShippingError::PledgeNotFound(pledge_id))?;
                pledge.allocated_quantity = pledge
                    .allocated_quantity
                    .checked_sub(record.match_quantity)
                    .ok_or_else(|| {
                        RepositoryError::Constraint(format!(
                            "pledge {pledge_id} has less allocated than match {match_id} ships"
                        ))
                    })?;
                pledge.fulfilled_quantity += record.match_quantity;
                tx.save_pledge(pledge)?;
            }
        }

        let previous = record.shipping_status;
        record.shipping_status = target;
        if let Some(tracking) = update.tracking_number {
            record.tracking_number = Some(tracking);
        }
        if let Some(date) = update.shipping_date {
            record.shipping_date = Some(date);
        }
        tx.save_match(record.clone())?;
        tx.commit()?;

        info!(
            match_id = %match_id,
            from = previous.label(),
            to = target.label(),
            actor = update.actor_role.label(),
            "shipping status updated"
        );
        Ok(record)
    }

    /// Cancel a match that has not shipped, returning its units to their source.
    pub fn cancel_match(&self, match_id: MatchId) -> Result<MatchRecord, ShippingError> {
        let mut tx = self.repository.begin()?;
        let record = tx
            .match_record(match_id)?
            .ok_or(ShippingError::MatchNotFound(match_id))?;

        let canceled = cancel_pending(&mut *tx, record, self.partial_status)?;
        tx.commit()?;

        info!(
            match_id = %match_id,
            request_id = %canceled.request_id,
            quantity = canceled.match_quantity,
            "match canceled"
        );
        Ok(canceled)
    }

    /// Withdraw a pledge and every match it still has waiting to ship.
    pub fn cancel_pledge(&self, pledge_id: PledgeId) -> Result<PledgeCancellation, ShippingError> {
        let mut tx = self.repository.begin()?;
        if tx.pledge(pledge_id)?.is_none() {
            return Err(ShippingError::PledgeNotFound(pledge_id));
        }

        let mut canceled_matches = Vec::new();
        let mut released_quantity = 0;
        for record in tx.matches_for_pledge(pledge_id)? {
            if record.canceled || record.shipping_status != ShippingStatus::Pending {
                continue;
            }
            let canceled = cancel_pending(&mut *tx, record, self.partial_status)?;
            released_quantity += canceled.match_quantity;
            canceled_matches.push(canceled.id);
        }

        // Re-read: releasing matches changed the allocated counter.
        let mut pledge = tx
            .pledge(pledge_id)?
            .ok_or(ShippingError::PledgeNotFound(pledge_id))?;
        pledge.canceled = true;
        tx.save_pledge(pledge)?;
        tx.commit()?;

        info!(
            pledge_id = %pledge_id,
            matches = canceled_matches.len(),
            released_quantity,
            "pledge canceled"
        );
        Ok(PledgeCancellation {
            pledge_id,
            canceled_matches,
            released_quantity,
        })
    }
}

fn cancel_pending<T: LedgerTransaction + ?Sized>(
    tx: &mut T,
    mut record: MatchRecord,
    partial_status: PartialMatchStatus,
) -> Result<MatchRecord, ShippingError> {
    if record.canceled {
        return Err(ShippingError::MatchCanceled(record.id));
    }
    if record.shipping_status != ShippingStatus::Pending {
        return Err(ShippingError::AlreadyShipped(record.id));
    }

    let request = tx
        .request(record.request_id)?
        .ok_or(RepositoryError::NotFound)?;

    match record.pledge_id {
        Some(pledge_id) => {
            let mut pledge = tx
                .pledge(pledge_id)?
                .ok_or(ShippingError::PledgeNotFound(pledge_id))?;
            pledge.allocated_quantity = pledge
                .allocated_quantity
                .saturating_sub(record.match_quantity);
            tx.save_pledge(pledge)?;
        }
        None => {
            let mut stock = tx
                .admin_inventory(request.item_id)?
                .unwrap_or(AdminInventoryItem {
                    item_id: request.item_id,
                    quantity: 0,
                });
            stock.quantity += record.match_quantity;
            tx.save_admin_inventory(stock)?;
        }
    }

    record.canceled = true;
    record.match_status = MatchStatus::Canceled;
    tx.save_match(record.clone())?;

    let still_matched = tx.active_matched_quantity(request.id)?;
    let status = settled_status(partial_status, request.status, still_matched, request.quantity);
    if status != request.status {
        tx.set_request_status(request.id, status)?;
    }

    Ok(record)
}

#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("pledge {0} not found")]
    PledgeNotFound(PledgeId),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("shipping status cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: ShippingStatus,
        to: ShippingStatus,
    },
    #[error("match {0} is canceled")]
    MatchCanceled(MatchId),
    #[error("match {0} has already shipped")]
    AlreadyShipped(MatchId),
    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
}
