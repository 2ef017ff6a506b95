use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::allocation::AllocationError;
use super::domain::{CandidateSource, RequestId, RequestRecord};
use super::repository::ReliefRepository;

/// Outstanding need for a request together with every usable supply source.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub request: RequestRecord,
    pub quantity_needed: u32,
    pub recipient_zip: Option<String>,
    pub candidates: Vec<CandidateSource>,
}

/// Computes candidate supply from snapshot reads. Nothing here is locked; the ledger
/// re-validates availability before writing.
pub struct SupplyResolver<R> {
    repository: Arc<R>,
}

impl<R> SupplyResolver<R>
where
    R: ReliefRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Need still open on a request: quantity minus the active matched total.
    pub fn outstanding(&self, request: &RequestRecord) -> Result<u32, AllocationError> {
        let matched: u32 = self
            .repository
            .matches_for_request(request.id)?
            .iter()
            .filter(|record| record.is_active())
            .map(|record| record.match_quantity)
            .sum();
        Ok(request.quantity.saturating_sub(matched))
    }

    pub fn resolve(
        &self,
        request_id: RequestId,
        today: NaiveDate,
    ) -> Result<CandidateSet, AllocationError> {
        let request = self
            .repository
            .request(request_id)?
            .ok_or(AllocationError::RequestNotFound(request_id))?;

        let quantity_needed = self.outstanding(&request)?;
        if quantity_needed == 0 {
            return Err(AllocationError::AlreadyFulfilled(request_id));
        }

        let mut candidates = Vec::new();

        if let Some(stock) = self.repository.admin_inventory(request.item_id)? {
            if stock.quantity > 0 {
                candidates.push(CandidateSource::admin(&stock));
            }
        }

        for pledge in self.repository.pledges_for_item(request.item_id)? {
            let available = pledge.usable_quantity(today);
            if available == 0 {
                continue;
            }
            let donor_zip = self.repository.zip_code(pledge.donor_id)?;
            candidates.push(CandidateSource::pledge(&pledge, available, donor_zip));
        }

        if candidates.is_empty() {
            return Err(AllocationError::NoSupply(request_id));
        }

        let recipient_zip = self.repository.zip_code(request.recipient_id)?;

        debug!(
            request_id = %request_id,
            quantity_needed,
            candidates = candidates.len(),
            "resolved candidate supply"
        );

        Ok(CandidateSet {
            request,
            quantity_needed,
            recipient_zip,
            candidates,
        })
    }
}
