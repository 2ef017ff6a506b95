use metrics_exporter_prometheus::PrometheusHandle;
use relief_match::error::AppError;
use relief_match::workflows::matching::seed::{
    load_inventory, load_pledges, load_requests, load_seed_dir, load_users,
};
use relief_match::workflows::matching::MemoryReliefStore;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

const SAMPLE_USERS: &str = "id,role,zip_code
1,recipient,50309
2,recipient,52401
10,donor,50010
11,donor,52240
12,donor,60601
13,donor,
90,admin,
";

const SAMPLE_REQUESTS: &str = "id,recipient_id,item_id,quantity,status,preferred_policy
100,1,7,40,pending,
101,2,7,15,pending,nearest
102,1,8,6,pending,quickest
";

const SAMPLE_PLEDGES: &str =
    "id,donor_id,item_id,item_quantity,allocated_quantity,fulfilled_quantity,days_to_ship,expires_on
200,10,7,12,,,3,
201,11,7,25,,,1,
202,12,7,8,2,,,
203,13,8,10,,,2,
";

const SAMPLE_INVENTORY: &str = "item_id,quantity
7,5
8,2
";

/// Store seeded from `dir` when given, otherwise empty.
pub(crate) fn load_store(dir: Option<&Path>) -> Result<Arc<MemoryReliefStore>, AppError> {
    let store = MemoryReliefStore::new();
    match dir {
        Some(dir) => {
            load_seed_dir(dir, &store)?;
        }
        None => info!("no seed directory configured; starting with an empty store"),
    }
    Ok(Arc::new(store))
}

/// Small built-in scenario: two recipients, four donors, and some admin stock.
pub(crate) fn sample_store() -> Result<MemoryReliefStore, AppError> {
    let store = MemoryReliefStore::new();
    load_users(SAMPLE_USERS.as_bytes(), &store)?;
    load_requests(SAMPLE_REQUESTS.as_bytes(), &store)?;
    load_pledges(SAMPLE_PLEDGES.as_bytes(), &store)?;
    load_inventory(SAMPLE_INVENTORY.as_bytes(), &store)?;
    Ok(store)
}
