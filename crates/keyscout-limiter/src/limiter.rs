use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use keyscout_core::{OperationClass, Plan, QuotaConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowKind {
    Minute,
    Day,
}

impl WindowKind {
    fn duration(self) -> Duration {
        match self {
            WindowKind::Minute => Duration::minutes(1),
            WindowKind::Day => Duration::days(1),
        }
    }
}

/// One fixed counting window. Windows are epoch-aligned; the counter only
/// ever grows until the window rolls over and a fresh one starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

impl RateWindow {
    fn aligned(now: DateTime<Utc>, kind: WindowKind) -> Self {
        let secs = kind.duration().num_seconds();
        let start = now.timestamp().div_euclid(secs) * secs;
        Self {
            window_start: DateTime::from_timestamp(start, 0).unwrap_or(now),
            count: 0,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>, kind: WindowKind) {
        if now >= self.reset_at(kind) {
            *self = Self::aligned(now, kind);
        }
    }

    fn reset_at(&self, kind: WindowKind) -> DateTime<Utc> {
        self.window_start + kind.duration()
    }
}

#[derive(Debug)]
struct AccountWindows {
    minute: RateWindow,
    day: RateWindow,
}

impl AccountWindows {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            minute: RateWindow::aligned(now, WindowKind::Minute),
            day: RateWindow::aligned(now, WindowKind::Day),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AccountKey {
    user_id: String,
    plan: Plan,
    op: OperationClass,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the tightest applicable window.
    pub remaining: u32,
    /// When the binding window rolls over.
    pub reset_at: DateTime<Utc>,
}

/// Per-operation usage against the long window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub used: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

/// Fixed-window quota tracker keyed by (user, plan, operation class).
///
/// Admission checks every applicable window and increments all of them in
/// one step under a per-account mutex, so check and commit cannot race.
/// A rejection leaves every counter untouched. Unrelated accounts live in
/// different map shards and never contend.
pub struct RateLimiter {
    quotas: QuotaConfig,
    accounts: DashMap<AccountKey, Mutex<AccountWindows>>,
}

impl RateLimiter {
    pub fn new(quotas: QuotaConfig) -> Self {
        Self {
            quotas,
            accounts: DashMap::new(),
        }
    }

    pub fn admit(&self, user_id: &str, plan: Plan, op: OperationClass) -> RateDecision {
        self.admit_at(user_id, plan, op, Utc::now())
    }

    /// Admission against an explicit clock, used directly by tests and
    /// replay tooling.
    pub fn admit_at(
        &self,
        user_id: &str,
        plan: Plan,
        op: OperationClass,
        now: DateTime<Utc>,
    ) -> RateDecision {
        let quota = self.quotas.quota(plan, op);
        let key = AccountKey {
            user_id: user_id.to_string(),
            plan,
            op,
        };
        let slot = self
            .accounts
            .entry(key)
            .or_insert_with(|| Mutex::new(AccountWindows::new(now)));
        let mut windows = slot.lock();
        windows.minute.roll(now, WindowKind::Minute);
        windows.day.roll(now, WindowKind::Day);

        if windows.minute.count >= quota.per_minute {
            debug!("minute quota exhausted for {} ({})", user_id, op);
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: windows.minute.reset_at(WindowKind::Minute),
            };
        }
        if windows.day.count >= quota.per_day {
            debug!("daily quota exhausted for {} ({})", user_id, op);
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: windows.day.reset_at(WindowKind::Day),
            };
        }

        windows.minute.count += 1;
        windows.day.count += 1;

        let minute_remaining = quota.per_minute - windows.minute.count;
        let day_remaining = quota.per_day - windows.day.count;
        let (remaining, reset_at) = if minute_remaining <= day_remaining {
            (minute_remaining, windows.minute.reset_at(WindowKind::Minute))
        } else {
            (day_remaining, windows.day.reset_at(WindowKind::Day))
        };

        RateDecision {
            allowed: true,
            remaining,
            reset_at,
        }
    }

    /// Current long-window usage for every operation class.
    pub fn usage(&self, user_id: &str, plan: Plan) -> HashMap<OperationClass, UsageReport> {
        self.usage_at(user_id, plan, Utc::now())
    }

    pub fn usage_at(
        &self,
        user_id: &str,
        plan: Plan,
        now: DateTime<Utc>,
    ) -> HashMap<OperationClass, UsageReport> {
        let mut out = HashMap::new();
        for op in OperationClass::ALL {
            let quota = self.quotas.quota(plan, op);
            let key = AccountKey {
                user_id: user_id.to_string(),
                plan,
                op,
            };
            let (used, reset_at) = match self.accounts.get(&key) {
                Some(slot) => {
                    let mut windows = slot.lock();
                    windows.day.roll(now, WindowKind::Day);
                    (windows.day.count, windows.day.reset_at(WindowKind::Day))
                }
                None => (
                    0,
                    RateWindow::aligned(now, WindowKind::Day).reset_at(WindowKind::Day),
                ),
            };
            out.insert(
                op,
                UsageReport {
                    used,
                    limit: quota.per_day,
                    reset_at,
                },
            );
        }
        out
    }

    /// Drop accounts whose windows have all rolled over. Windows are
    /// otherwise replaced lazily on next touch.
    pub fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now())
    }

    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.accounts.len();
        self.accounts.retain(|_, slot| {
            let windows = slot.lock();
            now < windows.day.reset_at(WindowKind::Day)
        });
        before - self.accounts.len()
    }
}
