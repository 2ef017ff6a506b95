use super::domain::{
    AdminInventoryItem, ItemId, MatchId, MatchRecord, NewMatch, Pledge, PledgeId, RequestId,
    RequestRecord, RequestStatus, UserId,
};

/// Storage abstraction so the matching workflow can be exercised in isolation.
///
/// Plain reads are snapshot reads and take no locks. Every mutation goes through a
/// [`LedgerTransaction`] obtained from [`ReliefRepository::begin`].
pub trait ReliefRepository: Send + Sync {
    fn request(&self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError>;
    fn matches_for_request(&self, id: RequestId) -> Result<Vec<MatchRecord>, RepositoryError>;
    fn match_record(&self, id: MatchId) -> Result<Option<MatchRecord>, RepositoryError>;
    fn admin_inventory(&self, item: ItemId)
        -> Result<Option<AdminInventoryItem>, RepositoryError>;
    fn pledge(&self, id: PledgeId) -> Result<Option<Pledge>, RepositoryError>;
    fn pledges_for_item(&self, item: ItemId) -> Result<Vec<Pledge>, RepositoryError>;
    fn zip_code(&self, user: UserId) -> Result<Option<String>, RepositoryError>;
    fn begin(&self) -> Result<Box<dyn LedgerTransaction + '_>, RepositoryError>;
}

/// Unit of work with serializable isolation over the rows it touches.
///
/// Reads inside the transaction observe its own staged writes. Dropping the
/// transaction without calling [`LedgerTransaction::commit`] discards every write.
pub trait LedgerTransaction {
    fn request(&mut self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError>;
    fn active_matched_quantity(&mut self, id: RequestId) -> Result<u32, RepositoryError>;
    fn pledge(&mut self, id: PledgeId) -> Result<Option<Pledge>, RepositoryError>;
    fn admin_inventory(
        &mut self,
        item: ItemId,
    ) -> Result<Option<AdminInventoryItem>, RepositoryError>;
    fn match_record(&mut self, id: MatchId) -> Result<Option<MatchRecord>, RepositoryError>;
    fn matches_for_pledge(&mut self, id: PledgeId) -> Result<Vec<MatchRecord>, RepositoryError>;
    fn insert_match(&mut self, new: NewMatch) -> Result<MatchRecord, RepositoryError>;
    fn save_match(&mut self, record: MatchRecord) -> Result<(), RepositoryError>;
    fn save_pledge(&mut self, pledge: Pledge) -> Result<(), RepositoryError>;
    fn save_admin_inventory(&mut self, item: AdminInventoryItem) -> Result<(), RepositoryError>;
    fn set_request_status(
        &mut self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), RepositoryError>;
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
