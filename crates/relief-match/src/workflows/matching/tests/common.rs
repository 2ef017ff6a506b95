use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::{MatchingConfig, PartialMatchStatus};
use crate::workflows::matching::distance::{DistanceError, DistanceService};
use crate::workflows::matching::domain::{
    AdminInventoryItem, CandidateSource, ItemId, MatchId, MatchRecord, NewMatch, Pledge, PledgeId,
    RequestId, RequestRecord, RequestStatus, UserAccount, UserId, UserRole,
};
use crate::workflows::matching::repository::{
    LedgerTransaction, ReliefRepository, RepositoryError,
};
use crate::workflows::matching::resolver::CandidateSet;
use crate::workflows::matching::{matching_router, MemoryReliefStore, ReliefMatchService};

pub(super) const ITEM: ItemId = ItemId(7);
pub(super) const RECIPIENT: UserId = UserId(1);

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
}

pub(super) fn request(id: u64, quantity: u32) -> RequestRecord {
    RequestRecord {
        id: RequestId(id),
        recipient_id: RECIPIENT,
        item_id: ITEM,
        quantity,
        status: RequestStatus::Pending,
        preferred_policy: None,
    }
}

pub(super) fn pledge(id: u64, donor: u64, quantity: u32, days_to_ship: Option<u32>) -> Pledge {
    Pledge {
        id: PledgeId(id),
        donor_id: UserId(donor),
        item_id: ITEM,
        item_quantity: quantity,
        allocated_quantity: 0,
        fulfilled_quantity: 0,
        days_to_ship,
        expires_on: None,
        canceled: false,
    }
}

pub(super) fn candidate(
    pledge_id: u64,
    available: u32,
    days_to_ship: Option<u32>,
    zip: Option<&str>,
) -> CandidateSource {
    let mut source = pledge(pledge_id, 100 + pledge_id, available, days_to_ship);
    source.item_quantity = available;
    CandidateSource::pledge(&source, available, zip.map(str::to_string))
}

pub(super) fn admin_candidate(quantity: u32) -> CandidateSource {
    CandidateSource::admin(&AdminInventoryItem {
        item_id: ITEM,
        quantity,
    })
}

pub(super) fn candidate_set(
    quantity_needed: u32,
    recipient_zip: Option<&str>,
    candidates: Vec<CandidateSource>,
) -> CandidateSet {
    CandidateSet {
        request: request(10, quantity_needed),
        quantity_needed,
        recipient_zip: recipient_zip.map(str::to_string),
        candidates,
    }
}

/// Recipient 1 in 50309 and donors 2, 3, 4 in increasingly distant zip codes.
pub(super) fn people_store() -> MemoryReliefStore {
    let store = MemoryReliefStore::new();
    let accounts = [
        (1, UserRole::Recipient, Some("50309")),
        (2, UserRole::Donor, Some("50010")),
        (3, UserRole::Donor, Some("52240")),
        (4, UserRole::Donor, Some("60601")),
        (9, UserRole::Admin, None),
    ];
    for (id, role, zip) in accounts {
        store
            .insert_user(UserAccount {
                id: UserId(id),
                role,
                zip_code: zip.map(str::to_string),
            })
            .expect("user inserts");
    }
    store
}

pub(super) fn seed_request(store: &MemoryReliefStore, id: u64, quantity: u32) {
    store
        .insert_request(request(id, quantity))
        .expect("request inserts");
}

pub(super) fn seed_pledge(
    store: &MemoryReliefStore,
    id: u64,
    donor: u64,
    quantity: u32,
    days_to_ship: Option<u32>,
) {
    store
        .insert_pledge(pledge(id, donor, quantity, days_to_ship))
        .expect("pledge inserts");
}

pub(super) fn seed_admin(store: &MemoryReliefStore, quantity: u32) {
    store
        .put_admin_inventory(AdminInventoryItem {
            item_id: ITEM,
            quantity,
        })
        .expect("inventory stored");
}

pub(super) fn build_service<R, D>(repository: Arc<R>, distance: D) -> ReliefMatchService<R, D>
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    build_service_with(repository, distance, PartialMatchStatus::LeavePending)
}

pub(super) fn build_service_with<R, D>(
    repository: Arc<R>,
    distance: D,
    partial_status: PartialMatchStatus,
) -> ReliefMatchService<R, D>
where
    R: ReliefRepository + 'static,
    D: DistanceService + 'static,
{
    ReliefMatchService::new(
        repository,
        Arc::new(distance),
        MatchingConfig { partial_status },
        Duration::from_millis(50),
    )
}

pub(super) fn router_with_store(store: Arc<MemoryReliefStore>) -> axum::Router {
    matching_router(Arc::new(build_service(store, StaticDistances::default())))
}

pub(super) fn pledge_state(store: &MemoryReliefStore, id: u64) -> Pledge {
    store
        .pledge(PledgeId(id))
        .expect("read pledge")
        .expect("pledge present")
}

pub(super) fn admin_quantity(store: &MemoryReliefStore) -> u32 {
    store
        .admin_inventory(ITEM)
        .expect("read inventory")
        .map(|stock| stock.quantity)
        .unwrap_or(0)
}

pub(super) fn request_state(store: &MemoryReliefStore, id: u64) -> RequestRecord {
    store
        .request(RequestId(id))
        .expect("read request")
        .expect("request present")
}

/// Distance lookup answering from a fixed table and counting calls.
#[derive(Default)]
pub(super) struct StaticDistances {
    table: HashMap<String, f64>,
    calls: AtomicUsize,
}

impl StaticDistances {
    pub(super) fn new(entries: &[(&str, f64)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(zip, distance)| (zip.to_string(), *distance))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DistanceService for StaticDistances {
    async fn distances(
        &self,
        _origin_zip: &str,
        candidate_zips: &[String],
    ) -> Result<HashMap<String, f64>, DistanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(candidate_zips
            .iter()
            .filter_map(|zip| self.table.get(zip).map(|distance| (zip.clone(), *distance)))
            .collect())
    }
}

pub(super) struct FailingDistances;

impl DistanceService for FailingDistances {
    async fn distances(
        &self,
        _origin_zip: &str,
        _candidate_zips: &[String],
    ) -> Result<HashMap<String, f64>, DistanceError> {
        Err(DistanceError::Status(503))
    }
}

pub(super) struct SlowDistances;

impl DistanceService for SlowDistances {
    async fn distances(
        &self,
        _origin_zip: &str,
        _candidate_zips: &[String],
    ) -> Result<HashMap<String, f64>, DistanceError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(HashMap::new())
    }
}

pub(super) struct UnavailableRepository;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl ReliefRepository for UnavailableRepository {
    fn request(&self, _id: RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        Err(offline())
    }

    fn matches_for_request(&self, _id: RequestId) -> Result<Vec<MatchRecord>, RepositoryError> {
        Err(offline())
    }

    fn match_record(&self, _id: MatchId) -> Result<Option<MatchRecord>, RepositoryError> {
        Err(offline())
    }

    fn admin_inventory(
        &self,
        _item: ItemId,
    ) -> Result<Option<AdminInventoryItem>, RepositoryError> {
        Err(offline())
    }

    fn pledge(&self, _id: PledgeId) -> Result<Option<Pledge>, RepositoryError> {
        Err(offline())
    }

    fn pledges_for_item(&self, _item: ItemId) -> Result<Vec<Pledge>, RepositoryError> {
        Err(offline())
    }

    fn zip_code(&self, _user: UserId) -> Result<Option<String>, RepositoryError> {
        Err(offline())
    }

    fn begin(&self) -> Result<Box<dyn LedgerTransaction + '_>, RepositoryError> {
        Err(offline())
    }
}

/// Store whose transactions stage writes normally but fail at commit.
pub(super) struct FailingCommitStore {
    pub(super) inner: MemoryReliefStore,
}

impl ReliefRepository for FailingCommitStore {
    fn request(&self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        self.inner.request(id)
    }

    fn matches_for_request(&self, id: RequestId) -> Result<Vec<MatchRecord>, RepositoryError> {
        self.inner.matches_for_request(id)
    }

    fn match_record(&self, id: MatchId) -> Result<Option<MatchRecord>, RepositoryError> {
        self.inner.match_record(id)
    }

    fn admin_inventory(
        &self,
        item: ItemId,
    ) -> Result<Option<AdminInventoryItem>, RepositoryError> {
        self.inner.admin_inventory(item)
    }

    fn pledge(&self, id: PledgeId) -> Result<Option<Pledge>, RepositoryError> {
        self.inner.pledge(id)
    }

    fn pledges_for_item(&self, item: ItemId) -> Result<Vec<Pledge>, RepositoryError> {
        self.inner.pledges_for_item(item)
    }

    fn zip_code(&self, user: UserId) -> Result<Option<String>, RepositoryError> {
        self.inner.zip_code(user)
    }

    fn begin(&self) -> Result<Box<dyn LedgerTransaction + '_>, RepositoryError> {
        Ok(Box::new(FailingCommit {
            inner: self.inner.begin()?,
        }))
    }
}

struct FailingCommit<'a> {
    inner: Box<dyn LedgerTransaction + 'a>,
}

impl LedgerTransaction for FailingCommit<'_> {
    fn request(&mut self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        self.inner.request(id)
    }

    fn active_matched_quantity(&mut self, id: RequestId) -> Result<u32, RepositoryError> {
        self.inner.active_matched_quantity(id)
    }

    fn pledge(&mut self, id: PledgeId) -> Result<Option<Pledge>, RepositoryError> {
        self.inner.pledge(id)
    }

    fn admin_inventory(
        &mut self,
        item: ItemId,
    ) -> Result<Option<AdminInventoryItem>, RepositoryError> {
        self.inner.admin_inventory(item)
    }

    fn match_record(&mut self, id: MatchId) -> Result<Option<MatchRecord>, RepositoryError> {
        self.inner.match_record(id)
    }

    fn matches_for_pledge(&mut self, id: PledgeId) -> Result<Vec<MatchRecord>, RepositoryError> {
        self.inner.matches_for_pledge(id)
    }

    fn insert_match(&mut self, new: NewMatch) -> Result<MatchRecord, RepositoryError> {
        self.inner.insert_match(new)
    }

    fn save_match(&mut self, record: MatchRecord) -> Result<(), RepositoryError> {
        self.inner.save_match(record)
    }

    fn save_pledge(&mut self, pledge: Pledge) -> Result<(), RepositoryError> {
        self.inner.save_pledge(pledge)
    }

    fn save_admin_inventory(&mut self, item: AdminInventoryItem) -> Result<(), RepositoryError> {
        self.inner.save_admin_inventory(item)
    }

    fn set_request_status(
        &mut self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.set_request_status(id, status)
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("commit rejected".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
