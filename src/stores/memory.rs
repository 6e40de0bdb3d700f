//! Canonical in-memory ledger store over plain keyed maps.
//!
//! All list accessors hand back owned copies, so callers can never reach the
//! internal maps through a returned value. There is no cross-operation mutual
//! exclusion: the mutex guards individual map accesses and is never held
//! across an await, so concurrent updates interleave last-writer-wins exactly
//! as in the original design.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::FixedOffset;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Frequency, ViceBankUser};

use super::{
    paginate, parse_filter_date, period_bounds, EntryMutation, EntryQuery, LedgerEntry,
    LedgerRule, LedgerStore, PageOptions, StoreEntity, UserStore, DEFAULT_UTC_OFFSET_SECONDS,
};

fn default_offset() -> FixedOffset {
    // -6 * 3600 is always in range for a fixed offset
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
}

fn not_found(kind: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} {} not found", kind, id))
}

struct LedgerMaps<R, E> {
    rules: HashMap<String, R>,
    entries: HashMap<String, E>,
}

/// In-memory ledger engine shared by both bank domains.
pub struct MemoryLedgerStore<R, E> {
    maps: Mutex<LedgerMaps<R, E>>,
    filter_offset: FixedOffset,
}

impl<R: LedgerRule, E: LedgerEntry> Default for MemoryLedgerStore<R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: LedgerRule, E: LedgerEntry> MemoryLedgerStore<R, E> {
    pub fn new() -> Self {
        Self::with_offset(default_offset())
    }

    /// `filter_offset` anchors date-only filter strings to midnight in a
    /// fixed zone.
    pub fn with_offset(filter_offset: FixedOffset) -> Self {
        Self {
            maps: Mutex::new(LedgerMaps {
                rules: HashMap::new(),
                entries: HashMap::new(),
            }),
            filter_offset,
        }
    }

    /// Seed a store, e.g. from a parsed file aggregate.
    pub fn with_data(rules: Vec<R>, entries: Vec<E>, filter_offset: FixedOffset) -> Self {
        let store = Self::with_offset(filter_offset);
        {
            let mut maps = store.lock_maps();
            for rule in rules {
                maps.rules.insert(rule.id().to_string(), rule);
            }
            for entry in entries {
                maps.entries.insert(entry.id().to_string(), entry);
            }
        }
        store
    }

    /// Owned copy of the whole aggregate, sorted by id for stable output.
    pub fn snapshot(&self) -> (Vec<R>, Vec<E>) {
        let maps = self.lock_maps();
        let mut rules: Vec<R> = maps.rules.values().cloned().collect();
        let mut entries: Vec<E> = maps.entries.values().cloned().collect();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        entries.sort_by(|a, b| a.id().cmp(b.id()));
        (rules, entries)
    }

    fn lock_maps(&self) -> std::sync::MutexGuard<'_, LedgerMaps<R, E>> {
        match self.maps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn entries_in_range(
        &self,
        owner_id: &str,
        rule_id: Option<&str>,
        start: Option<chrono::DateTime<FixedOffset>>,
        end_exclusive: Option<chrono::DateTime<FixedOffset>>,
        end_inclusive: Option<chrono::DateTime<FixedOffset>>,
    ) -> Vec<E> {
        let maps = self.lock_maps();
        let mut matched: Vec<E> = maps
            .entries
            .values()
            .filter(|entry| entry.owner_id() == owner_id)
            .filter(|entry| rule_id.map_or(true, |rid| entry.rule_id() == rid))
            .filter(|entry| start.map_or(true, |s| entry.date() >= s))
            .filter(|entry| end_exclusive.map_or(true, |e| entry.date() < e))
            .filter(|entry| end_inclusive.map_or(true, |e| entry.date() <= e))
            .cloned()
            .collect();
        matched.sort_by_key(|entry| entry.date());
        matched
    }
}

#[async_trait]
impl<R: LedgerRule, E: LedgerEntry> LedgerStore<R, E> for MemoryLedgerStore<R, E> {
    async fn get_rules(&self, owner_id: &str, opts: &PageOptions) -> Result<Vec<R>, AppError> {
        let mut matched: Vec<R> = {
            let maps = self.lock_maps();
            maps.rules
                .values()
                .filter(|rule| rule.owner_id() == owner_id)
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(paginate(matched, opts.page, opts.pagination))
    }

    async fn add_rule(&self, rule: R) -> Result<R, AppError> {
        let stored = rule.with_id(Uuid::new_v4().to_string());
        self.lock_maps()
            .rules
            .insert(stored.id().to_string(), stored.clone());
        Ok(stored)
    }

    async fn update_rule(&self, rule: R) -> Result<R, AppError> {
        let mut maps = self.lock_maps();
        if !maps.rules.contains_key(rule.id()) {
            return Err(not_found(R::KIND, rule.id()));
        }
        let previous = maps
            .rules
            .insert(rule.id().to_string(), rule.clone())
            .ok_or_else(|| not_found(R::KIND, rule.id()))?;
        Ok(previous)
    }

    async fn delete_rule(&self, id: &str) -> Result<R, AppError> {
        self.lock_maps()
            .rules
            .remove(id)
            .ok_or_else(|| not_found(R::KIND, id))
    }

    async fn get_entries(&self, query: &EntryQuery) -> Result<Vec<E>, AppError> {
        let start = query
            .start_date
            .as_deref()
            .and_then(|raw| parse_filter_date(raw, self.filter_offset));
        let end = query
            .end_date
            .as_deref()
            .and_then(|raw| parse_filter_date(raw, self.filter_offset));

        let matched = self.entries_in_range(&query.owner_id, None, start, None, end);
        Ok(paginate(matched, query.page, query.pagination))
    }

    async fn add_entry(&self, entry: E) -> Result<EntryMutation<E>, AppError> {
        let stored = entry.with_id(Uuid::new_v4().to_string());
        let tokens_added = stored.tokens_earned();
        self.lock_maps()
            .entries
            .insert(stored.id().to_string(), stored.clone());
        Ok(EntryMutation {
            entry: stored,
            tokens_added,
        })
    }

    async fn update_entry(&self, entry: E) -> Result<EntryMutation<E>, AppError> {
        let mut maps = self.lock_maps();
        let previous = maps
            .entries
            .get(entry.id())
            .cloned()
            .ok_or_else(|| not_found(E::KIND, entry.id()))?;
        let tokens_added = entry.tokens_earned() - previous.tokens_earned();
        maps.entries.insert(entry.id().to_string(), entry);
        Ok(EntryMutation {
            entry: previous,
            tokens_added,
        })
    }

    async fn delete_entry(&self, id: &str) -> Result<EntryMutation<E>, AppError> {
        let removed = self
            .lock_maps()
            .entries
            .remove(id)
            .ok_or_else(|| not_found(E::KIND, id))?;
        let tokens_added = -removed.tokens_earned();
        Ok(EntryMutation {
            entry: removed,
            tokens_added,
        })
    }

    async fn entries_for_frequency(
        &self,
        entry: &E,
        frequency: Frequency,
    ) -> Result<Vec<E>, AppError> {
        let Some((start, end)) = period_bounds(entry.date(), frequency) else {
            return Ok(Vec::new());
        };
        let matched = self.entries_in_range(
            entry.owner_id(),
            Some(entry.rule_id()),
            Some(start),
            Some(end),
            None,
        );
        let defaults = PageOptions::default();
        Ok(paginate(matched, defaults.page, defaults.pagination))
    }

    async fn backup(&self) -> Result<(), AppError> {
        // nothing durable to snapshot
        Ok(())
    }
}

/// In-memory vice bank user store.
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, ViceBankUser>>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a store, e.g. from a parsed file.
    pub fn with_data(users: Vec<ViceBankUser>) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock_users();
            for user in users {
                map.insert(user.id.clone(), user);
            }
        }
        store
    }

    /// Owned copy of all users, sorted by id for stable output.
    pub fn snapshot(&self) -> Vec<ViceBankUser> {
        let map = self.lock_users();
        let mut users: Vec<ViceBankUser> = map.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    fn lock_users(&self) -> std::sync::MutexGuard<'_, HashMap<String, ViceBankUser>> {
        match self.users.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_users(
        &self,
        user_id: &str,
        opts: &PageOptions,
    ) -> Result<Vec<ViceBankUser>, AppError> {
        let mut matched: Vec<ViceBankUser> = {
            let map = self.lock_users();
            map.values()
                .filter(|user| user.user_id == user_id)
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(paginate(matched, opts.page, opts.pagination))
    }

    async fn get_user(&self, id: &str) -> Result<ViceBankUser, AppError> {
        self.lock_users()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(ViceBankUser::KIND, id))
    }

    async fn add_user(&self, user: ViceBankUser) -> Result<ViceBankUser, AppError> {
        let stored = user.with_id(Uuid::new_v4().to_string());
        self.lock_users().insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_user(&self, user: ViceBankUser) -> Result<ViceBankUser, AppError> {
        let mut map = self.lock_users();
        if !map.contains_key(&user.id) {
            return Err(not_found(ViceBankUser::KIND, &user.id));
        }
        let previous = map
            .insert(user.id.clone(), user.clone())
            .ok_or_else(|| not_found(ViceBankUser::KIND, &user.id))?;
        Ok(previous)
    }

    async fn delete_user(&self, id: &str) -> Result<ViceBankUser, AppError> {
        self.lock_users()
            .remove(id)
            .ok_or_else(|| not_found(ViceBankUser::KIND, id))
    }

    async fn backup(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, Deposit};

    fn action(name: &str, owner: &str) -> Action {
        Action {
            id: String::new(),
            vb_user_id: owner.to_string(),
            name: name.to_string(),
            conversion_unit: "minutes".to_string(),
            deposits_per: 1.0,
            tokens_per: 1.0,
            min_deposit: 0.0,
            max_deposit: None,
        }
    }

    fn deposit(owner: &str, date: &str, quantity: f64, rate: f64) -> Deposit {
        Deposit {
            id: String::new(),
            vb_user_id: owner.to_string(),
            date: date.parse().unwrap(),
            deposit_quantity: quantity,
            conversion_rate: rate,
            action_id: "a-1".to_string(),
            action_name: "Reading".to_string(),
            conversion_unit: "minutes".to_string(),
        }
    }

    fn store() -> MemoryLedgerStore<Action, Deposit> {
        MemoryLedgerStore::new()
    }

    #[tokio::test]
    async fn test_add_rule_assigns_fresh_id() {
        let store = store();
        let mut rule = action("Reading", "vb-1");
        rule.id = "caller-supplied".to_string();

        let stored = store.add_rule(rule).await.unwrap();
        assert_ne!(stored.id, "caller-supplied");
        assert!(!stored.id.is_empty());
    }

    #[tokio::test]
    async fn test_get_rules_sorted_by_name_and_scoped_to_owner() {
        let store = store();
        store.add_rule(action("zumba", "vb-1")).await.unwrap();
        store.add_rule(action("Aerobics", "vb-1")).await.unwrap();
        store.add_rule(action("Biking", "vb-2")).await.unwrap();

        let rules = store
            .get_rules("vb-1", &PageOptions::default())
            .await
            .unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Aerobics", "zumba"]);
    }

    #[tokio::test]
    async fn test_rule_pagination_window() {
        let store = store();
        for i in 0..7 {
            store
                .add_rule(action(&format!("rule-{}", i), "vb-1"))
                .await
                .unwrap();
        }

        let opts = PageOptions {
            page: 2,
            pagination: 3,
        };
        let page = store.get_rules("vb-1", &opts).await.unwrap();
        let names: Vec<&str> = page.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["rule-3", "rule-4", "rule-5"]);

        let out_of_range = PageOptions {
            page: 9,
            pagination: 3,
        };
        assert!(store.get_rules("vb-1", &out_of_range).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rule_returns_previous() {
        let store = store();
        let stored = store.add_rule(action("Reading", "vb-1")).await.unwrap();

        let mut updated = stored.clone();
        updated.name = "Deep reading".to_string();
        let previous = store.update_rule(updated.clone()).await.unwrap();
        assert_eq!(previous.name, "Reading");

        let rules = store
            .get_rules("vb-1", &PageOptions::default())
            .await
            .unwrap();
        assert_eq!(rules[0].name, "Deep reading");
    }

    #[tokio::test]
    async fn test_update_rule_not_found_includes_id() {
        let store = store();
        let mut rule = action("Reading", "vb-1");
        rule.id = "missing-rule-id".to_string();

        let err = store.update_rule(rule).await.unwrap_err();
        assert!(err.message().contains("missing-rule-id"));
        assert_eq!(err.error_code(), crate::errors::codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_rule_returns_removed_and_errors_on_absent() {
        let store = store();
        let stored = store.add_rule(action("Reading", "vb-1")).await.unwrap();

        let removed = store.delete_rule(&stored.id).await.unwrap();
        assert_eq!(removed.name, "Reading");

        let err = store.delete_rule(&stored.id).await.unwrap_err();
        assert!(err.message().contains(&stored.id));
    }

    #[tokio::test]
    async fn test_defensive_copy_on_rule_lists() {
        let store = store();
        store.add_rule(action("Reading", "vb-1")).await.unwrap();

        let mut first = store
            .get_rules("vb-1", &PageOptions::default())
            .await
            .unwrap();
        first[0].name = "Tampered".to_string();
        first.clear();

        let second = store
            .get_rules("vb-1", &PageOptions::default())
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "Reading");
    }

    #[tokio::test]
    async fn test_date_range_filtering_scenario() {
        let store = store();
        store
            .add_entry(deposit("A", "2024-01-01T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();
        store
            .add_entry(deposit("A", "2024-01-12T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();
        store
            .add_entry(deposit("B", "2024-02-01T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();

        let mut query = EntryQuery::for_owner("A");
        query.start_date = Some("2024-01-08".to_string());
        let after = store.get_entries(&query).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].date.to_rfc3339(), "2024-01-12T10:00:00-06:00");

        // the end bound is inclusive: entries strictly after it are dropped,
        // everything at or before it survives
        let mut query = EntryQuery::for_owner("A");
        query.end_date = Some("2024-01-30".to_string());
        let before = store.get_entries(&query).await.unwrap();
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].date.to_rfc3339(), "2024-01-01T10:00:00-06:00");
        assert_eq!(before[1].date.to_rfc3339(), "2024-01-12T10:00:00-06:00");

        let mut query = EntryQuery::for_owner("A");
        query.end_date = Some("2024-01-08".to_string());
        let early = store.get_entries(&query).await.unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].date.to_rfc3339(), "2024-01-01T10:00:00-06:00");

        let mut query = EntryQuery::for_owner("A");
        query.start_date = Some("2024-01-08".to_string());
        query.end_date = Some("2024-02-09".to_string());
        let between = store.get_entries(&query).await.unwrap();
        assert_eq!(between.len(), 1);
        assert_eq!(between[0].date.to_rfc3339(), "2024-01-12T10:00:00-06:00");
    }

    #[tokio::test]
    async fn test_unparseable_date_filters_are_ignored() {
        let store = store();
        store
            .add_entry(deposit("A", "2024-01-01T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();
        store
            .add_entry(deposit("A", "2024-01-12T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();

        let mut query = EntryQuery::for_owner("A");
        query.start_date = Some("not-a-date".to_string());
        query.end_date = Some("also garbage".to_string());

        let all = store.get_entries(&query).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_sorted_ascending_by_date() {
        let store = store();
        store
            .add_entry(deposit("A", "2024-01-12T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();
        store
            .add_entry(deposit("A", "2024-01-01T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();

        let all = store
            .get_entries(&EntryQuery::for_owner("A"))
            .await
            .unwrap();
        assert!(all[0].date < all[1].date);
    }

    #[tokio::test]
    async fn test_token_delta_scenario() {
        let store = store();

        let added = store
            .add_entry(deposit("A", "2024-01-01T10:00:00-06:00", 1.0, 1.0))
            .await
            .unwrap();
        assert!((added.tokens_added - 1.0).abs() < f64::EPSILON);
        assert!(!added.entry.id.is_empty());

        let mut revised = added.entry.clone();
        revised.deposit_quantity = 2.0;
        let updated = store.update_entry(revised).await.unwrap();
        assert!((updated.tokens_added - 1.0).abs() < f64::EPSILON);
        // update hands back the previous value
        assert!((updated.entry.deposit_quantity - 1.0).abs() < f64::EPSILON);

        let deleted = store.delete_entry(&added.entry.id).await.unwrap();
        assert!((deleted.tokens_added + 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_token_delta_conservation() {
        let store = store();
        let mut delta_sum = 0.0;

        let first = store
            .add_entry(deposit("A", "2024-01-01T10:00:00-06:00", 3.0, 2.0))
            .await
            .unwrap();
        delta_sum += first.tokens_added;
        let second = store
            .add_entry(deposit("A", "2024-01-02T10:00:00-06:00", 5.0, 1.0))
            .await
            .unwrap();
        delta_sum += second.tokens_added;

        let mut revised = first.entry.clone();
        revised.deposit_quantity = 10.0;
        delta_sum += store.update_entry(revised).await.unwrap().tokens_added;
        delta_sum += store
            .delete_entry(&second.entry.id)
            .await
            .unwrap()
            .tokens_added;

        let remaining = store
            .get_entries(&EntryQuery::for_owner("A"))
            .await
            .unwrap();
        let aggregate: f64 = remaining.iter().map(|d| d.tokens_earned()).sum();
        assert!((delta_sum - aggregate).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_entry_not_found_messages_include_id() {
        let store = store();

        let err = store.delete_entry("ghost-entry").await.unwrap_err();
        assert!(err.message().contains("ghost-entry"));

        let mut entry = deposit("A", "2024-01-01T10:00:00-06:00", 1.0, 1.0);
        entry.id = "phantom".to_string();
        let err = store.update_entry(entry).await.unwrap_err();
        assert!(err.message().contains("phantom"));
    }

    #[tokio::test]
    async fn test_entries_for_frequency_scopes_owner_rule_and_period() {
        let store = store();
        let mut in_week = deposit("A", "2024-03-05T10:00:00-06:00", 1.0, 1.0);
        in_week.action_id = "a-1".to_string();
        let mut other_rule = deposit("A", "2024-03-05T11:00:00-06:00", 1.0, 1.0);
        other_rule.action_id = "a-2".to_string();
        let mut prior_week = deposit("A", "2024-02-26T10:00:00-06:00", 1.0, 1.0);
        prior_week.action_id = "a-1".to_string();

        store.add_entry(in_week.clone()).await.unwrap();
        store.add_entry(other_rule).await.unwrap();
        store.add_entry(prior_week).await.unwrap();

        let matches = store
            .entries_for_frequency(&in_week, Frequency::Weekly)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].action_id, "a-1");
        assert_eq!(matches[0].date.to_rfc3339(), "2024-03-05T10:00:00-06:00");

        let daily = store
            .entries_for_frequency(&in_week, Frequency::Daily)
            .await
            .unwrap();
        assert_eq!(daily.len(), 1);

        let monthly = store
            .entries_for_frequency(&in_week, Frequency::Monthly)
            .await
            .unwrap();
        assert_eq!(monthly.len(), 1);
    }

    fn user(name: &str, owner: &str, tokens: f64) -> ViceBankUser {
        ViceBankUser {
            id: String::new(),
            user_id: owner.to_string(),
            name: name.to_string(),
            current_tokens: tokens,
        }
    }

    #[tokio::test]
    async fn test_user_crud_and_balance_replacement() {
        let store = MemoryUserStore::new();
        let stored = store.add_user(user("Alex", "acct-1", 0.0)).await.unwrap();

        // controller applies a ledger delta by full replacement
        let mut credited = stored.clone();
        credited.current_tokens += 5.0;
        let previous = store.update_user(credited).await.unwrap();
        assert!((previous.current_tokens - 0.0).abs() < f64::EPSILON);

        let fetched = store.get_user(&stored.id).await.unwrap();
        assert!((fetched.current_tokens - 5.0).abs() < f64::EPSILON);

        let removed = store.delete_user(&stored.id).await.unwrap();
        assert_eq!(removed.name, "Alex");
        let err = store.get_user(&stored.id).await.unwrap_err();
        assert!(err.message().contains(&stored.id));
    }

    #[tokio::test]
    async fn test_get_users_sorted_and_scoped() {
        let store = MemoryUserStore::new();
        store.add_user(user("zoe", "acct-1", 0.0)).await.unwrap();
        store.add_user(user("Ben", "acct-1", 0.0)).await.unwrap();
        store.add_user(user("Ada", "acct-2", 0.0)).await.unwrap();

        let users = store
            .get_users("acct-1", &PageOptions::default())
            .await
            .unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Ben", "zoe"]);
    }
}
