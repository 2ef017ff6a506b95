use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    AdminInventoryItem, ItemId, MatchId, MatchRecord, MatchStatus, NewMatch, Pledge, PledgeId,
    RequestId, RequestRecord, RequestStatus, ShippingStatus, UserAccount, UserId,
};
use super::repository::{LedgerTransaction, ReliefRepository, RepositoryError};

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: HashMap<UserId, UserAccount>,
    requests: BTreeMap<RequestId, RequestRecord>,
    pledges: BTreeMap<PledgeId, Pledge>,
    inventory: BTreeMap<ItemId, AdminInventoryItem>,
    matches: BTreeMap<MatchId, MatchRecord>,
    next_match_id: u64,
}

impl StoreState {
    fn active_matched_quantity(&self, id: RequestId) -> u32 {
        self.matches
            .values()
            .filter(|record| record.request_id == id && record.is_active())
            .map(|record| record.match_quantity)
            .sum()
    }
}

/// In-process store guarded by a single mutex.
///
/// A transaction holds the lock for its whole lifetime and stages writes on a copy of
/// the state, so concurrent ledger calls are serialized and a dropped transaction
/// leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryReliefStore {
    state: Mutex<StoreState>,
}

impl MemoryReliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn insert_user(&self, account: UserAccount) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&account.id) {
            return Err(RepositoryError::Conflict);
        }
        state.users.insert(account.id, account);
        Ok(())
    }

    pub fn insert_request(&self, request: RequestRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        state.requests.insert(request.id, request);
        Ok(())
    }

    pub fn insert_pledge(&self, pledge: Pledge) -> Result<(), RepositoryError> {
        if !pledge.is_consistent() {
            return Err(RepositoryError::Constraint(format!(
                "pledge {} commits more than it pledged",
                pledge.id
            )));
        }
        let mut state = self.lock()?;
        if state.pledges.contains_key(&pledge.id) {
            return Err(RepositoryError::Conflict);
        }
        state.pledges.insert(pledge.id, pledge);
        Ok(())
    }

    pub fn put_admin_inventory(&self, item: AdminInventoryItem) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.inventory.insert(item.item_id, item);
        Ok(())
    }

    pub fn all_matches(&self) -> Result<Vec<MatchRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.matches.values().cloned().collect())
    }
}

impl ReliefRepository for MemoryReliefStore {
    fn request(&self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        Ok(self.lock()?.requests.get(&id).cloned())
    }

    fn matches_for_request(&self, id: RequestId) -> Result<Vec<MatchRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .matches
            .values()
            .filter(|record| record.request_id == id)
            .cloned()
            .collect())
    }

    fn match_record(&self, id: MatchId) -> Result<Option<MatchRecord>, RepositoryError> {
        Ok(self.lock()?.matches.get(&id).cloned())
    }

    fn admin_inventory(
        &self,
        item: ItemId,
    ) -> Result<Option<AdminInventoryItem>, RepositoryError> {
        Ok(self.lock()?.inventory.get(&item).copied())
    }

    fn pledge(&self, id: PledgeId) -> Result<Option<Pledge>, RepositoryError> {
        Ok(self.lock()?.pledges.get(&id).cloned())
    }

    fn pledges_for_item(&self, item: ItemId) -> Result<Vec<Pledge>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .pledges
            .values()
            .filter(|pledge| pledge.item_id == item)
            .cloned()
            .collect())
    }

    fn zip_code(&self, user: UserId) -> Result<Option<String>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .users
            .get(&user)
            .and_then(|account| account.zip_code.clone()))
    }

    fn begin(&self) -> Result<Box<dyn LedgerTransaction + '_>, RepositoryError> {
        let guard = self.lock()?;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, StoreState>,
    staged: StoreState,
}

impl LedgerTransaction for MemoryTransaction<'_> {
    fn request(&mut self, id: RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        Ok(self.staged.requests.get(&id).cloned())
    }

    fn active_matched_quantity(&mut self, id: RequestId) -> Result<u32, RepositoryError> {
        Ok(self.staged.active_matched_quantity(id))
    }

    fn pledge(&mut self, id: PledgeId) -> Result<Option<Pledge>, RepositoryError> {
        Ok(self.staged.pledges.get(&id).cloned())
    }

    fn admin_inventory(
        &mut self,
        item: ItemId,
    ) -> Result<Option<AdminInventoryItem>, RepositoryError> {
        Ok(self.staged.inventory.get(&item).copied())
    }

    fn match_record(&mut self, id: MatchId) -> Result<Option<MatchRecord>, RepositoryError> {
        Ok(self.staged.matches.get(&id).cloned())
    }

    fn matches_for_pledge(&mut self, id: PledgeId) -> Result<Vec<MatchRecord>, RepositoryError> {
        Ok(self
            .staged
            .matches
            .values()
            .filter(|record| record.pledge_id == Some(id))
            .cloned()
            .collect())
    }

    fn insert_match(&mut self, new: NewMatch) -> Result<MatchRecord, RepositoryError> {
        if new.match_quantity == 0 {
            return Err(RepositoryError::Constraint(
                "match quantity must be positive".to_string(),
            ));
        }
        if !self.staged.requests.contains_key(&new.request_id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(pledge_id) = new.pledge_id {
            if !self.staged.pledges.contains_key(&pledge_id) {
                return Err(RepositoryError::NotFound);
            }
        }

        self.staged.next_match_id += 1;
        let record = MatchRecord {
            id: MatchId(self.staged.next_match_id),
            request_id: new.request_id,
            pledge_id: new.pledge_id,
            match_quantity: new.match_quantity,
            match_status: MatchStatus::Matched,
            match_type: new.match_type,
            canceled: false,
            shipping_status: ShippingStatus::Pending,
            tracking_number: None,
            shipping_date: None,
        };
        self.staged.matches.insert(record.id, record.clone());
        Ok(record)
    }

    fn save_match(&mut self, record: MatchRecord) -> Result<(), RepositoryError> {
        match self.staged.matches.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn save_pledge(&mut self, pledge: Pledge) -> Result<(), RepositoryError> {
        if !pledge.is_consistent() {
            return Err(RepositoryError::Constraint(format!(
                "pledge {} would commit {} of {} units",
                pledge.id,
                u64::from(pledge.allocated_quantity) + u64::from(pledge.fulfilled_quantity),
                pledge.item_quantity
            )));
        }
        match self.staged.pledges.get_mut(&pledge.id) {
            Some(slot) => {
                *slot = pledge;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn save_admin_inventory(&mut self, item: AdminInventoryItem) -> Result<(), RepositoryError> {
        self.staged.inventory.insert(item.item_id, item);
        Ok(())
    }

    fn set_request_status(
        &mut self,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), RepositoryError> {
        match self.staged.requests.get_mut(&id) {
            Some(request) => {
                request.status = status;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
