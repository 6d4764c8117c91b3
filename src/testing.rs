//! In-memory collaborators for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::adapters::traits::{CheckpointStore, DestinationSink, DonationSource};
use crate::crm::models::{Constituent, Email, Gift, GiftType};
use crate::error::{AppError, AppResult};
use crate::source::models::{Donation, Payment, RecurringPlan, Supporter};
use crate::storage::MemoryCheckpointStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    #[default]
    Never,
    Dependency,
    Auth,
}

impl FailMode {
    fn check(self, what: &str) -> AppResult<()> {
        match self {
            FailMode::Never => Ok(()),
            FailMode::Dependency => Err(AppError::UnexpectedStatus {
                status: 500,
                body: format!("{} failed", what),
            }),
            FailMode::Auth => Err(AppError::Auth(format!("{} unauthorized", what))),
        }
    }
}

#[derive(Default)]
struct CrmState {
    constituents: Vec<Constituent>,
    gifts: Vec<Gift>,
    next_id: usize,
    constituent_creates: usize,
    gift_creates: usize,
    gift_updates: usize,
    gift_list_calls: usize,
    fail_gift_creates: FailMode,
}

#[derive(Default)]
pub struct FakeCrm {
    state: Mutex<CrmState>,
}

impl FakeCrm {
    pub fn add_constituent(&self, id: &str, email: &str) {
        self.state.lock().constituents.push(Constituent {
            id: id.to_string(),
            email: Some(Email {
                address: email.to_string(),
                primary: true,
                email_type: "Email".into(),
            }),
            ..Default::default()
        });
    }

    pub fn add_gift(&self, gift: Gift) {
        self.state.lock().gifts.push(gift);
    }

    pub fn gifts(&self) -> Vec<Gift> {
        self.state.lock().gifts.clone()
    }

    pub fn constituents(&self) -> Vec<Constituent> {
        self.state.lock().constituents.clone()
    }

    pub fn fail_gift_creates(&self, mode: FailMode) {
        self.state.lock().fail_gift_creates = mode;
    }

    pub fn write_count(&self) -> usize {
        let state = self.state.lock();
        state.constituent_creates + state.gift_creates + state.gift_updates
    }

    pub fn gift_list_calls(&self) -> usize {
        self.state.lock().gift_list_calls
    }
}

#[async_trait]
impl DestinationSink for FakeCrm {
    async fn find_constituents_by_email(&self, email: &str) -> AppResult<Vec<Constituent>> {
        Ok(self
            .state
            .lock()
            .constituents
            .iter()
            .filter(|c| c.email.as_ref().is_some_and(|e| e.address.eq_ignore_ascii_case(email)))
            .cloned()
            .collect())
    }

    async fn create_constituent(&self, constituent: &Constituent) -> AppResult<String> {
        let mut state = self.state.lock();
        state.next_id += 1;
        state.constituent_creates += 1;
        let id = format!("c-{}", state.next_id);
        state.constituents.push(Constituent {
            id: id.clone(),
            ..constituent.clone()
        });
        Ok(id)
    }

    async fn list_gifts_by_constituent(
        &self,
        constituent_id: &str,
        gift_type: Option<&GiftType>,
    ) -> AppResult<Vec<Gift>> {
        let mut state = self.state.lock();
        state.gift_list_calls += 1;
        Ok(state
            .gifts
            .iter()
            .filter(|g| g.constituent_id == constituent_id)
            .filter(|g| gift_type.map_or(true, |t| &g.gift_type == t))
            .cloned()
            .collect())
    }

    async fn create_gift(&self, gift: &Gift) -> AppResult<String> {
        let mut state = self.state.lock();
        state.fail_gift_creates.check("create gift")?;
        state.next_id += 1;
        state.gift_creates += 1;
        let id = format!("g-{}", state.next_id);
        state.gifts.push(Gift {
            id: id.clone(),
            ..gift.clone()
        });
        Ok(id)
    }

    async fn update_gift(&self, gift_id: &str, gift: &Gift) -> AppResult<()> {
        let mut state = self.state.lock();
        state.gift_updates += 1;
        let existing = state
            .gifts
            .iter_mut()
            .find(|g| g.id == gift_id)
            .ok_or_else(|| AppError::NotFound(format!("gift {}", gift_id)))?;
        *existing = Gift {
            id: gift_id.to_string(),
            ..gift.clone()
        };
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSource {
    donations: Mutex<Vec<Donation>>,
    fetch_since_calls: Mutex<Vec<DateTime<Utc>>>,
    fetch_by_id_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with(donations: Vec<Donation>) -> Self {
        Self {
            donations: Mutex::new(donations),
            ..Default::default()
        }
    }

    pub fn fetch_since_calls(&self) -> Vec<DateTime<Utc>> {
        self.fetch_since_calls.lock().clone()
    }

    pub fn fetch_by_id_calls(&self) -> usize {
        self.fetch_by_id_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DonationSource for FakeSource {
    async fn fetch_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Donation>> {
        self.fetch_since_calls.lock().push(since);
        Ok(self
            .donations
            .lock()
            .iter()
            .filter(|d| d.created_at >= since)
            .cloned()
            .collect())
    }

    async fn fetch_by_id(&self, id: &str) -> AppResult<Donation> {
        self.fetch_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.donations
            .lock()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("donation {}", id)))
    }
}

/// Checkpoint that starts failing writes after `ok_writes` successful ones
pub struct FlakyCheckpointStore {
    pub inner: MemoryCheckpointStore,
    ok_writes: AtomicUsize,
}

impl FlakyCheckpointStore {
    pub fn new(inner: MemoryCheckpointStore, ok_writes: usize) -> Self {
        Self {
            inner,
            ok_writes: AtomicUsize::new(ok_writes),
        }
    }

    fn spend_write(&self) -> AppResult<()> {
        self.ok_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| AppError::Checkpoint("disk full".into()))
    }
}

#[async_trait]
impl CheckpointStore for FlakyCheckpointStore {
    async fn last_sync_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        self.inner.last_sync_time().await
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> AppResult<()> {
        self.spend_write()?;
        self.inner.set_last_sync_time(at).await
    }

    async fn pending_ids(&self) -> AppResult<Vec<String>> {
        self.inner.pending_ids().await
    }

    async fn set_pending_ids(&self, ids: &[String]) -> AppResult<()> {
        self.spend_write()?;
        self.inner.set_pending_ids(ids).await
    }
}

// ========== Fixtures ==========

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

pub fn supporter(email: &str) -> Supporter {
    Supporter {
        id: format!("sup-{}", email),
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        email: email.into(),
        ..Default::default()
    }
}

pub fn donation(id: &str, amount: &str) -> Donation {
    Donation {
        id: id.into(),
        amount: amount.into(),
        currency: "USD".into(),
        created_at: at(1, 9),
        supporter: Some(supporter("jane@example.org")),
        payment: Some(Payment {
            method: "credit_card".into(),
        }),
        ..Default::default()
    }
}

pub fn installment(id: &str, series: &str, n: u32) -> Donation {
    Donation {
        recurring_plan: Some(RecurringPlan {
            id: series.into(),
            frequency: "monthly".into(),
            status: "active".into(),
            ..Default::default()
        }),
        installment: Some(n.to_string()),
        created_at: at(n.min(28), 9),
        ..donation(id, "20.00")
    }
}
