use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Length of one budget window. Windows are aligned to governor construction.
pub const BUDGET_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBudgetState {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub used: u32,
    pub max_actions: u32,
    pub window_start: DateTime<Utc>,
    pub resets_at: DateTime<Utc>,
}

impl BudgetStatus {
    pub fn remaining(&self) -> u32 {
        self.max_actions.saturating_sub(self.used)
    }

    pub fn utilization_percentage(&self) -> f64 {
        if self.max_actions == 0 {
            return 100.0;
        }
        (self.used as f64 / self.max_actions as f64) * 100.0
    }
}

/// Hourly cap on outbound reply actions.
///
/// Callers must get `true` from [`try_consume`](Self::try_consume) before
/// acting. The count is charged before the platform call, so a failed call
/// still uses budget.
#[derive(Debug)]
pub struct RateBudgetGovernor {
    max_actions: AtomicU32,
    created_at: Instant,
    state: Mutex<RateBudgetState>,
}

impl RateBudgetGovernor {
    pub fn new(max_actions_per_hour: u32) -> Self {
        Self {
            max_actions: AtomicU32::new(max_actions_per_hour),
            created_at: Instant::now(),
            state: Mutex::new(RateBudgetState {
                count: 0,
                window_start: Utc::now(),
            }),
        }
    }

    pub fn max_actions(&self) -> u32 {
        self.max_actions.load(Ordering::Relaxed)
    }

    /// Changes the cap for the rest of the current window and after. The
    /// count already charged in this window is kept.
    pub fn set_max_actions(&self, max_actions_per_hour: u32) {
        self.max_actions.store(max_actions_per_hour, Ordering::Relaxed);
    }

    pub async fn has_budget(&self) -> bool {
        self.state.lock().await.count < self.max_actions()
    }

    /// Charges one action if the cap allows it. Denial is not an error.
    pub async fn try_consume(&self) -> bool {
        let mut state = self.state.lock().await;
        let max_actions = self.max_actions();
        if state.count >= max_actions {
            debug!("Rate budget exhausted ({}/{})", state.count, max_actions);
            return false;
        }
        state.count += 1;
        true
    }

    pub async fn used(&self) -> u32 {
        self.state.lock().await.count
    }

    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        info!("Resetting rate budget ({} actions used)", state.count);
        state.count = 0;
        state.window_start = Utc::now();
    }

    pub async fn status(&self) -> BudgetStatus {
        let state = self.state.lock().await;
        let window = chrono::Duration::from_std(BUDGET_WINDOW).unwrap_or(chrono::Duration::hours(1));
        BudgetStatus {
            used: state.count,
            max_actions: self.max_actions(),
            window_start: state.window_start,
            resets_at: state.window_start + window,
        }
    }

    /// Spawns the hourly reset, ticking at construction + n hours. The task
    /// ends on its own once the governor is dropped.
    pub fn spawn_reset_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let governor: Weak<Self> = Arc::downgrade(self);
        let first_reset = self.created_at + BUDGET_WINDOW;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_reset, BUDGET_WINDOW);
            loop {
                ticker.tick().await;
                match governor.upgrade() {
                    Some(governor) => governor.reset().await,
                    None => break,
                }
            }
        })
    }
}
