//! Four-window per-user influence ledger.
//!
//! All-time totals only ever shrink through an explicit rejection, and
//! that rejection is applied unfloored; the periodic windows are floored
//! at zero instead. The asymmetry matches the observed behavior of the
//! system this replaces and is covered by tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::gateway::UserId;
use crate::scheduler::ResetWindow;

#[derive(Debug, Default)]
struct Windows {
    all_time: HashMap<UserId, u64>,
    daily: HashMap<UserId, u64>,
    weekly: HashMap<UserId, u64>,
    monthly: HashMap<UserId, u64>,
}

#[derive(Debug, Default)]
pub struct InfluenceLedger {
    windows: Mutex<Windows>,
}

/// Aggregate view used by the details panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTotals {
    pub all_time: u64,
    pub daily: u64,
    pub weekly: u64,
    pub monthly: u64,
    pub contributors: usize,
}

impl InfluenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a donation to all four windows.
    pub fn credit(&self, user: &UserId, amount: u64) -> u64 {
        let mut guard = self.lock();
        let windows = &mut *guard;
        for map in [&mut windows.daily, &mut windows.weekly, &mut windows.monthly] {
            *map.entry(user.clone()).or_insert(0) += amount;
        }
        let total = windows.all_time.entry(user.clone()).or_insert(0);
        *total += amount;
        *total
    }

    /// Take back a rejected donation. Applies only when the user's
    /// all-time total covers the amount; otherwise nothing changes.
    /// All-time is decremented exactly, the periodic windows saturate
    /// at zero.
    pub fn rescind(&self, user: &UserId, amount: u64) -> bool {
        let mut guard = self.lock();
        let windows = &mut *guard;
        let current = windows.all_time.get(user).copied().unwrap_or(0);
        if current < amount {
            return false;
        }
        windows.all_time.insert(user.clone(), current - amount);
        for map in [&mut windows.daily, &mut windows.weekly, &mut windows.monthly] {
            let value = map.entry(user.clone()).or_insert(0);
            *value = value.saturating_sub(amount);
        }
        true
    }

    /// Bulk-clear one periodic window. All-time is never cleared.
    pub fn clear(&self, window: ResetWindow) {
        let mut windows = self.lock();
        match window {
            ResetWindow::Daily => windows.daily.clear(),
            ResetWindow::Weekly => windows.weekly.clear(),
            ResetWindow::Monthly => windows.monthly.clear(),
        }
    }

    /// Whether the user has ever had an all-time entry. A fully rescinded
    /// donor still counts; only process restart forgets them.
    pub fn is_contributor(&self, user: &UserId) -> bool {
        self.lock().all_time.contains_key(user)
    }

    pub fn all_time(&self, user: &UserId) -> u64 {
        self.lock().all_time.get(user).copied().unwrap_or(0)
    }

    pub fn window_amount(&self, window: ResetWindow, user: &UserId) -> u64 {
        let windows = self.lock();
        let map = match window {
            ResetWindow::Daily => &windows.daily,
            ResetWindow::Weekly => &windows.weekly,
            ResetWindow::Monthly => &windows.monthly,
        };
        map.get(user).copied().unwrap_or(0)
    }

    /// Top `limit` donors by all-time total, highest first.
    pub fn ranking(&self, limit: usize) -> Vec<(UserId, u64)> {
        let windows = self.lock();
        let mut rows: Vec<(UserId, u64)> = windows
            .all_time
            .iter()
            .map(|(user, amount)| (user.clone(), *amount))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(limit);
        rows
    }

    pub fn totals(&self) -> LedgerTotals {
        let windows = self.lock();
        LedgerTotals {
            all_time: windows.all_time.values().sum(),
            daily: windows.daily.values().sum(),
            weekly: windows.weekly.values().sum(),
            monthly: windows.monthly.values().sum(),
            contributors: windows.all_time.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Windows> {
        self.windows.lock().expect("ledger lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn credit_raises_every_window() {
        let ledger = InfluenceLedger::new();
        assert_eq!(ledger.credit(&user("a"), 100), 100);
        assert_eq!(ledger.credit(&user("a"), 50), 150);

        assert_eq!(ledger.all_time(&user("a")), 150);
        assert_eq!(ledger.window_amount(ResetWindow::Daily, &user("a")), 150);
        assert_eq!(ledger.window_amount(ResetWindow::Weekly, &user("a")), 150);
        assert_eq!(ledger.window_amount(ResetWindow::Monthly, &user("a")), 150);
    }

    #[test]
    fn rescind_is_exact_on_all_time_and_floored_on_windows() {
        let ledger = InfluenceLedger::new();
        ledger.credit(&user("a"), 100);
        ledger.clear(ResetWindow::Daily);
        ledger.credit(&user("a"), 30);

        // Daily now holds 30, all-time 130. Rescinding 100 floors daily.
        assert!(ledger.rescind(&user("a"), 100));
        assert_eq!(ledger.all_time(&user("a")), 30);
        assert_eq!(ledger.window_amount(ResetWindow::Daily, &user("a")), 0);
        assert_eq!(ledger.window_amount(ResetWindow::Weekly, &user("a")), 30);
    }

    #[test]
    fn rescind_beyond_total_changes_nothing() {
        let ledger = InfluenceLedger::new();
        ledger.credit(&user("a"), 40);
        assert!(!ledger.rescind(&user("a"), 41));
        assert_eq!(ledger.all_time(&user("a")), 40);
        assert_eq!(ledger.window_amount(ResetWindow::Daily, &user("a")), 40);
    }

    #[test]
    fn clear_touches_one_window_only() {
        let ledger = InfluenceLedger::new();
        ledger.credit(&user("a"), 10);
        ledger.clear(ResetWindow::Weekly);

        assert_eq!(ledger.all_time(&user("a")), 10);
        assert_eq!(ledger.window_amount(ResetWindow::Daily, &user("a")), 10);
        assert_eq!(ledger.window_amount(ResetWindow::Weekly, &user("a")), 0);
        assert_eq!(ledger.window_amount(ResetWindow::Monthly, &user("a")), 10);
    }

    #[test]
    fn ranking_sorts_descending_and_truncates() {
        let ledger = InfluenceLedger::new();
        ledger.credit(&user("low"), 5);
        ledger.credit(&user("high"), 500);
        ledger.credit(&user("mid"), 50);

        let top_two = ledger.ranking(2);
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[0], (user("high"), 500));
        assert_eq!(top_two[1], (user("mid"), 50));
    }

    #[test]
    fn totals_aggregate_across_users() {
        let ledger = InfluenceLedger::new();
        ledger.credit(&user("a"), 10);
        ledger.credit(&user("b"), 20);
        ledger.clear(ResetWindow::Monthly);

        let totals = ledger.totals();
        assert_eq!(totals.all_time, 30);
        assert_eq!(totals.daily, 30);
        assert_eq!(totals.monthly, 0);
        assert_eq!(totals.contributors, 2);
    }
}
