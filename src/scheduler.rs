//! Timer-driven lifecycle: one queue of `{fire_at, task}` entries instead
//! of fire-and-forget callbacks, so the whole timer surface is testable
//! with an injected clock.
//!
//! Calendar boundaries (midnight / Monday midnight / first-of-month
//! midnight, all UTC) are recomputed after every fire rather than added
//! as fixed periods, so resets track the calendar even across clock
//! drift and long suspensions.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};

/// Everything a timer can do. A closed enum keeps the queue inspectable
/// and keeps scheduling decoupled from handler wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTask {
    /// Auto-close a vote at its deadline. Shares the manual-close path
    /// and is a no-op when the vote is already gone.
    CloseVote { vote_id: String },
    /// Re-render all still-active vote summaries.
    RefreshVotes,
    /// Bulk-clear one periodic ledger window.
    ResetLedger { window: ResetWindow },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetWindow {
    Daily,
    Weekly,
    Monthly,
}

impl ResetWindow {
    pub fn label(self) -> &'static str {
        match self {
            ResetWindow::Daily => "daily",
            ResetWindow::Weekly => "weekly",
            ResetWindow::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    fire_at: DateTime<Utc>,
    seq: u64,
    task: TimerTask,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: DateTime<Utc>, task: TimerTask) {
        self.seq += 1;
        self.heap.push(Reverse(Entry {
            fire_at,
            seq: self.seq,
            task,
        }));
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse(entry)| entry.fire_at)
    }

    /// Remove and return every task due at or before `now`, in firing
    /// order. Ties fire in scheduling order.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<TimerTask> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.fire_at > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().expect("peeked entry vanished");
            due.push(entry.task);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Shared handle workflows use to schedule deadlines.
#[derive(Clone, Default)]
pub struct Timers(Arc<Mutex<TimerQueue>>);

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, fire_at: DateTime<Utc>, task: TimerTask) {
        self.lock().schedule(fire_at, task);
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.lock().next_deadline()
    }

    pub fn pop_due(&self, now: DateTime<Utc>) -> Vec<TimerTask> {
        self.lock().pop_due(now)
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerQueue> {
        self.0.lock().expect("timer queue lock poisoned")
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

/// Next strictly-future calendar boundary for a reset window.
pub fn next_boundary(window: ResetWindow, after: DateTime<Utc>) -> DateTime<Utc> {
    match window {
        ResetWindow::Daily => midnight(after.date_naive().succ_opt().expect("date overflow")),
        ResetWindow::Weekly => {
            let mut date = after.date_naive().succ_opt().expect("date overflow");
            while date.weekday() != Weekday::Mon {
                date = date.succ_opt().expect("date overflow");
            }
            midnight(date)
        }
        ResetWindow::Monthly => {
            let (year, month) = if after.month() == 12 {
                (after.year() + 1, 1)
            } else {
                (after.year(), after.month() + 1)
            };
            midnight(NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is valid"))
        }
    }
}
