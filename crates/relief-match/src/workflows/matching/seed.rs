use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use super::allocation::MatchPolicy;
use super::domain::{
    AdminInventoryItem, ItemId, Pledge, PledgeId, RequestId, RequestRecord, RequestStatus,
    UserAccount, UserId, UserRole,
};
use super::repository::RepositoryError;
use super::store::MemoryReliefStore;

/// Row counts loaded from a seed directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub requests: usize,
    pub pledges: usize,
    pub inventory: usize,
}

#[derive(Debug)]
pub enum SeedError {
    Io { path: PathBuf, source: std::io::Error },
    Csv(csv::Error),
    InvalidRow { file: &'static str, message: String },
    Store(RepositoryError),
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::Io { path, source } => {
                write!(f, "failed to read seed file {}: {}", path.display(), source)
            }
            SeedError::Csv(err) => write!(f, "invalid seed CSV data: {}", err),
            SeedError::InvalidRow { file, message } => write!(f, "{}: {}", file, message),
            SeedError::Store(err) => write!(f, "failed to store seed row: {}", err),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Io { source, .. } => Some(source),
            SeedError::Csv(err) => Some(err),
            SeedError::InvalidRow { .. } => None,
            SeedError::Store(err) => Some(err),
        }
    }
}

impl From<csv::Error> for SeedError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for SeedError {
    fn from(err: RepositoryError) -> Self {
        Self::Store(err)
    }
}

/// Load `users.csv`, `requests.csv`, `pledges.csv`, and `inventory.csv` from `dir`.
/// Missing files are skipped.
pub fn load_seed_dir(dir: &Path, store: &MemoryReliefStore) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    if let Some(file) = open_optional(dir, "users.csv")? {
        summary.users = load_users(file, store)?;
    }
    if let Some(file) = open_optional(dir, "requests.csv")? {
        summary.requests = load_requests(file, store)?;
    }
    if let Some(file) = open_optional(dir, "pledges.csv")? {
        summary.pledges = load_pledges(file, store)?;
    }
    if let Some(file) = open_optional(dir, "inventory.csv")? {
        summary.inventory = load_inventory(file, store)?;
    }

    info!(
        dir = %dir.display(),
        users = summary.users,
        requests = summary.requests,
        pledges = summary.pledges,
        inventory = summary.inventory,
        "seed data loaded"
    );
    Ok(summary)
}

fn open_optional(dir: &Path, name: &str) -> Result<Option<File>, SeedError> {
    let path = dir.join(name);
    match File::open(&path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "seed file absent");
            Ok(None)
        }
        Err(source) => Err(SeedError::Io { path, source }),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

pub fn load_users<R: Read>(reader: R, store: &MemoryReliefStore) -> Result<usize, SeedError> {
    let mut count = 0;
    for row in csv_reader(reader).deserialize::<UserRow>() {
        let row = row?;
        let role = UserRole::parse(&row.role).ok_or_else(|| SeedError::InvalidRow {
            file: "users.csv",
            message: format!("user {} has unknown role '{}'", row.id, row.role),
        })?;
        store.insert_user(UserAccount {
            id: UserId(row.id),
            role,
            zip_code: row.zip_code,
        })?;
        count += 1;
    }
    Ok(count)
}

pub fn load_requests<R: Read>(reader: R, store: &MemoryReliefStore) -> Result<usize, SeedError> {
    let mut count = 0;
    for row in csv_reader(reader).deserialize::<RequestRow>() {
        let row = row?;
        let preferred_policy = row
            .preferred_policy
            .as_deref()
            .map(str::parse::<MatchPolicy>)
            .transpose()
            .map_err(|err| SeedError::InvalidRow {
                file: "requests.csv",
                message: format!("request {}: {}", row.id, err),
            })?;
        store.insert_request(RequestRecord {
            id: RequestId(row.id),
            recipient_id: UserId(row.recipient_id),
            item_id: ItemId(row.item_id),
            quantity: row.quantity,
            status: row.status.unwrap_or(RequestStatus::Pending),
            preferred_policy,
        })?;
        count += 1;
    }
    Ok(count)
}

pub fn load_pledges<R: Read>(reader: R, store: &MemoryReliefStore) -> Result<usize, SeedError> {
    let mut count = 0;
    for row in csv_reader(reader).deserialize::<PledgeRow>() {
        let row = row?;
        let expires_on = row
            .expires_on
            .as_deref()
            .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .transpose()
            .map_err(|err| SeedError::InvalidRow {
                file: "pledges.csv",
                message: format!("pledge {} has invalid expires_on ({err})", row.id),
            })?;
        store.insert_pledge(Pledge {
            id: PledgeId(row.id),
            donor_id: UserId(row.donor_id),
            item_id: ItemId(row.item_id),
            item_quantity: row.item_quantity,
            allocated_quantity: row.allocated_quantity.unwrap_or(0),
            fulfilled_quantity: row.fulfilled_quantity.unwrap_or(0),
            days_to_ship: row.days_to_ship,
            expires_on,
            canceled: false,
        })?;
        count += 1;
    }
    Ok(count)
}

pub fn load_inventory<R: Read>(reader: R, store: &MemoryReliefStore) -> Result<usize, SeedError> {
    let mut count = 0;
    for row in csv_reader(reader).deserialize::<InventoryRow>() {
        let row = row?;
        store.put_admin_inventory(AdminInventoryItem {
            item_id: ItemId(row.item_id),
            quantity: row.quantity,
        })?;
        count += 1;
    }
    Ok(count)
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: u64,
    role: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestRow {
    id: u64,
    recipient_id: u64,
    item_id: u64,
    quantity: u32,
    #[serde(default)]
    status: Option<RequestStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    preferred_policy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PledgeRow {
    id: u64,
    donor_id: u64,
    item_id: u64,
    item_quantity: u32,
    #[serde(default)]
    allocated_quantity: Option<u32>,
    #[serde(default)]
    fulfilled_quantity: Option<u32>,
    #[serde(default)]
    days_to_ship: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    expires_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InventoryRow {
    item_id: u64,
    quantity: u32,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
