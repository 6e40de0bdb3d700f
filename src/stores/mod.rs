//! Ledger store contracts and the query/mutation types they share.
//!
//! Both bank domains implement the same accounting pattern, so the store is a
//! single generic engine parameterized by a conversion-rule type and a ledger
//! entry type. The in-memory store is the canonical implementation; the
//! file-backed store composes it with a write-through persistence step.

pub mod factory;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Weekday};

use crate::errors::AppError;
use crate::models::{
    Action, Deposit, DepositConversion, Frequency, TaskDeposit, ViceBankUser,
};

/// Default UTC offset for date-only filter strings (America/Chicago standard
/// time).
pub const DEFAULT_UTC_OFFSET_SECONDS: i32 = -6 * 3600;

/// An entity a store can key and own.
pub trait StoreEntity: Clone + Send + Sync + 'static {
    /// Entity kind label used in not-found messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
    /// Copy of the entity with a server-assigned id.
    fn with_id(&self, id: String) -> Self;
    /// Strict parse: shape and semantic validation.
    fn parse_json(value: serde_json::Value) -> Result<Self, AppError>
    where
        Self: Sized;
    fn to_json(&self) -> serde_json::Value;
}

/// A named conversion rule.
pub trait LedgerRule: StoreEntity {
    fn name(&self) -> &str;
}

/// A timestamped ledger entry worth a token amount.
pub trait LedgerEntry: StoreEntity {
    fn date(&self) -> DateTime<FixedOffset>;
    /// Tokens this entry earned at the rate frozen when it was created.
    fn tokens_earned(&self) -> f64;
    /// Id of the rule or task this entry was logged against.
    fn rule_id(&self) -> &str;
}

/// Pagination window. Slicing is `skip = pagination * (page - 1)`,
/// `end = pagination * page`; out-of-range pages yield empty results.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub page: u32,
    pub pagination: u32,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page: 1,
            pagination: 10,
        }
    }
}

/// Query options for ledger entries.
///
/// The date bounds are raw strings straight from the request layer; bounds
/// that fail to parse are treated as absent rather than raised. That
/// permissiveness is load-bearing, tested behavior.
#[derive(Debug, Clone)]
pub struct EntryQuery {
    pub owner_id: String,
    pub page: u32,
    pub pagination: u32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl EntryQuery {
    pub fn for_owner(owner_id: &str) -> Self {
        let defaults = PageOptions::default();
        Self {
            owner_id: owner_id.to_string(),
            page: defaults.page,
            pagination: defaults.pagination,
            start_date: None,
            end_date: None,
        }
    }
}

/// Result of a ledger mutation: the affected entry plus the signed token
/// delta the controller applies to the owner's balance.
///
/// Add returns the stored entry and `+tokens_earned`; update returns the
/// previous entry and `new - old`; delete returns the removed entry and
/// `-tokens_earned`. The store itself never touches user balances.
#[derive(Debug, Clone)]
pub struct EntryMutation<E> {
    pub entry: E,
    pub tokens_added: f64,
}

/// Persistence contract shared by the in-memory and file-backed engines.
#[async_trait]
pub trait LedgerStore<R: LedgerRule, E: LedgerEntry>: Send + Sync {
    /// Rules for one owner, sorted ascending by name, paginated.
    async fn get_rules(&self, owner_id: &str, opts: &PageOptions) -> Result<Vec<R>, AppError>;
    /// Store a rule under a fresh server-assigned id; never echoes a
    /// caller-supplied id.
    async fn add_rule(&self, rule: R) -> Result<R, AppError>;
    /// Replace a rule wholesale; returns the previous value.
    async fn update_rule(&self, rule: R) -> Result<R, AppError>;
    /// Remove a rule; returns the removed value.
    async fn delete_rule(&self, id: &str) -> Result<R, AppError>;

    /// Entries for one owner, date-filtered, sorted ascending by date,
    /// paginated.
    async fn get_entries(&self, query: &EntryQuery) -> Result<Vec<E>, AppError>;
    async fn add_entry(&self, entry: E) -> Result<EntryMutation<E>, AppError>;
    async fn update_entry(&self, entry: E) -> Result<EntryMutation<E>, AppError>;
    async fn delete_entry(&self, id: &str) -> Result<EntryMutation<E>, AppError>;

    /// Entries by the same owner against the same rule inside the period
    /// bucket containing `entry.date()`. Used to detect an already-credited
    /// recurring task before awarding tokens again.
    async fn entries_for_frequency(
        &self,
        entry: &E,
        frequency: Frequency,
    ) -> Result<Vec<E>, AppError>;

    /// Timestamped snapshot of the current aggregate; no-op for in-memory
    /// stores.
    async fn backup(&self) -> Result<(), AppError>;
}

/// Persistence contract for vice bank users.
///
/// `current_tokens` is only ever changed through `update_user`; the ledger
/// stores report deltas and this store records what callers apply.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_users(
        &self,
        user_id: &str,
        opts: &PageOptions,
    ) -> Result<Vec<ViceBankUser>, AppError>;
    async fn get_user(&self, id: &str) -> Result<ViceBankUser, AppError>;
    async fn add_user(&self, user: ViceBankUser) -> Result<ViceBankUser, AppError>;
    /// Full replacement; returns the previous value.
    async fn update_user(&self, user: ViceBankUser) -> Result<ViceBankUser, AppError>;
    async fn delete_user(&self, id: &str) -> Result<ViceBankUser, AppError>;
    async fn backup(&self) -> Result<(), AppError>;
}

/// Apply the shared pagination window.
pub(crate) fn paginate<T>(items: Vec<T>, page: u32, pagination: u32) -> Vec<T> {
    let skip = (pagination as usize).saturating_mul((page as usize).saturating_sub(1));
    items
        .into_iter()
        .skip(skip)
        .take(pagination as usize)
        .collect()
}

/// Parse a date filter bound; `None` means the filter is not applied.
///
/// Accepts full ISO-8601 timestamps with offset, or date-only strings which
/// resolve to midnight at `default_offset`. Anything else is silently
/// ignored.
pub(crate) fn parse_filter_date(
    raw: &str,
    default_offset: FixedOffset,
) -> Option<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date);
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return at_midnight(day, default_offset);
    }
    None
}

/// Midnight at the start of `day` in `offset`.
fn at_midnight(day: NaiveDate, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    day.and_time(NaiveTime::MIN)
        .and_local_timezone(offset)
        .single()
}

/// Start (inclusive) and end (exclusive) of the period bucket containing
/// `date`, in the date's own offset. Weeks start Monday; months are calendar
/// months.
pub(crate) fn period_bounds(
    date: DateTime<FixedOffset>,
    frequency: Frequency,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let offset = *date.offset();
    let day = date.date_naive();
    let (start_day, end_day) = match frequency {
        Frequency::Daily => (day, day + Duration::days(1)),
        Frequency::Weekly => {
            let start = day.week(Weekday::Mon).first_day();
            (start, start + Duration::days(7))
        }
        Frequency::Monthly => {
            let start = NaiveDate::from_ymd_opt(day.year(), day.month(), 1)?;
            let end = if day.month() == 12 {
                NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)?
            };
            (start, end)
        }
    };
    Some((at_midnight(start_day, offset)?, at_midnight(end_day, offset)?))
}

// ==================== ENTITY SEAM IMPLS ====================

impl StoreEntity for Action {
    const KIND: &'static str = "Action";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.vb_user_id
    }

    fn with_id(&self, id: String) -> Self {
        Self { id, ..self.clone() }
    }

    fn parse_json(value: serde_json::Value) -> Result<Self, AppError> {
        Action::from_json(value)
    }

    fn to_json(&self) -> serde_json::Value {
        Action::to_json(self)
    }
}

impl LedgerRule for Action {
    fn name(&self) -> &str {
        &self.name
    }
}

impl StoreEntity for DepositConversion {
    const KIND: &'static str = "DepositConversion";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn with_id(&self, id: String) -> Self {
        Self { id, ..self.clone() }
    }

    fn parse_json(value: serde_json::Value) -> Result<Self, AppError> {
        DepositConversion::from_json(value)
    }

    fn to_json(&self) -> serde_json::Value {
        DepositConversion::to_json(self)
    }
}

impl LedgerRule for DepositConversion {
    fn name(&self) -> &str {
        &self.name
    }
}

impl StoreEntity for Deposit {
    const KIND: &'static str = "Deposit";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.vb_user_id
    }

    fn with_id(&self, id: String) -> Self {
        Self { id, ..self.clone() }
    }

    fn parse_json(value: serde_json::Value) -> Result<Self, AppError> {
        Deposit::from_json(value)
    }

    fn to_json(&self) -> serde_json::Value {
        Deposit::to_json(self)
    }
}

impl LedgerEntry for Deposit {
    fn date(&self) -> DateTime<FixedOffset> {
        self.date
    }

    fn tokens_earned(&self) -> f64 {
        Deposit::tokens_earned(self)
    }

    fn rule_id(&self) -> &str {
        &self.action_id
    }
}

impl StoreEntity for TaskDeposit {
    const KIND: &'static str = "TaskDeposit";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn with_id(&self, id: String) -> Self {
        Self { id, ..self.clone() }
    }

    fn parse_json(value: serde_json::Value) -> Result<Self, AppError> {
        TaskDeposit::from_json(value)
    }

    fn to_json(&self) -> serde_json::Value {
        TaskDeposit::to_json(self)
    }
}

impl LedgerEntry for TaskDeposit {
    fn date(&self) -> DateTime<FixedOffset> {
        self.date
    }

    fn tokens_earned(&self) -> f64 {
        TaskDeposit::tokens_earned(self)
    }

    fn rule_id(&self) -> &str {
        &self.task_id
    }
}

impl StoreEntity for ViceBankUser {
    const KIND: &'static str = "ViceBankUser";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn with_id(&self, id: String) -> Self {
        Self { id, ..self.clone() }
    }

    fn parse_json(value: serde_json::Value) -> Result<Self, AppError> {
        ViceBankUser::from_json(value)
    }

    fn to_json(&self) -> serde_json::Value {
        ViceBankUser::to_json(self)
    }
}
