use crate::budget::RateBudgetGovernor;
use crate::cycle::{EngagementPacing, EngineDeps, EngineShared, RunContext};
use crate::policy::EngagementPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use signalpost_core::{ActivityRecord, EngagementConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const STATUS_ACTIVITY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub current_budget_used: u32,
    pub budget_reset_at: Option<DateTime<Utc>>,
    pub recent_activity: Vec<ActivityRecord>,
}

struct ActiveRun {
    context: Arc<RunContext>,
    shutdown: watch::Sender<bool>,
    cycle_loop: JoinHandle<()>,
}

/// Periodic engagement for one account.
///
/// Each engine owns its own budget and history; run one engine per account.
/// A run starts with an immediate cycle, then repeats every
/// `check_interval_minutes` until [`stop`](Self::stop).
///
/// The hourly budget window is aligned to engine construction and survives
/// stop and start, so restarting never hands out a fresh allowance.
pub struct AutonomousEngine {
    account_id: String,
    deps: Arc<EngineDeps>,
    shared: Arc<EngineShared>,
    pacing: EngagementPacing,
    active: Mutex<Option<ActiveRun>>,
    budget_reset: Mutex<Option<JoinHandle<()>>>,
}

impl AutonomousEngine {
    pub fn new(account_id: impl Into<String>, deps: EngineDeps, proactive_topics: Vec<String>) -> Self {
        let governor = RateBudgetGovernor::new(EngagementConfig::default().max_actions_per_hour);
        Self {
            account_id: account_id.into(),
            deps: Arc::new(deps),
            shared: Arc::new(EngineShared::new(proactive_topics, governor)),
            pacing: EngagementPacing::default(),
            active: Mutex::new(None),
            budget_reset: Mutex::new(None),
        }
    }

    pub fn with_pacing(mut self, pacing: EngagementPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub async fn start(&self, config: EngagementConfig) -> StartOutcome {
        let mut active = self.active.lock().await;
        if active.is_some() {
            info!("Engine for account {} is already running", self.account_id);
            return StartOutcome::AlreadyRunning;
        }
        if !config.enabled {
            info!("Engagement disabled for account {}, not starting", self.account_id);
            return StartOutcome::Disabled;
        }

        let config = config.normalized();
        self.shared.governor.set_max_actions(config.max_actions_per_hour);
        {
            let mut budget_reset = self.budget_reset.lock().await;
            if budget_reset.is_none() {
                *budget_reset = Some(self.shared.governor.spawn_reset_timer());
            }
        }
        let (shutdown, shutdown_rx) = watch::channel(false);

        info!(
            "Starting engagement for account {}: every {} min, {} actions/hour",
            self.account_id, config.check_interval_minutes, config.max_actions_per_hour
        );

        let context = Arc::new(RunContext {
            account_id: self.account_id.clone(),
            policy: EngagementPolicy::from_config(&config),
            config,
            pacing: self.pacing,
            deps: self.deps.clone(),
            shared: self.shared.clone(),
            shutdown: shutdown_rx.clone(),
        });
        let cycle_loop = tokio::spawn(run_loop(context.clone(), shutdown_rx));

        *active = Some(ActiveRun {
            context,
            shutdown,
            cycle_loop,
        });
        StartOutcome::Started
    }

    /// Disarms the timer. A cycle already in flight finishes on its own.
    pub async fn stop(&self) -> bool {
        match self.take_run().await {
            Some(_) => true,
            None => {
                debug!("Engine for account {} is not running", self.account_id);
                false
            }
        }
    }

    /// Like [`stop`](Self::stop), but waits for an in-flight cycle to finish.
    pub async fn shutdown(&self) {
        if let Some(cycle_loop) = self.take_run().await {
            if let Err(e) = cycle_loop.await {
                error!("Cycle loop for account {} ended abnormally: {}", self.account_id, e);
            }
        }
    }

    async fn take_run(&self) -> Option<JoinHandle<()>> {
        let run = self.active.lock().await.take()?;
        // Receivers still see `true` after the sender is dropped.
        let _ = run.shutdown.send(true);
        info!("Stopped engagement for account {}", self.account_id);
        Some(run.cycle_loop)
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn status(&self) -> EngineStatus {
        let budget = if self.is_running().await {
            Some(self.shared.governor.status().await)
        } else {
            None
        };

        EngineStatus {
            running: budget.is_some(),
            current_budget_used: budget.as_ref().map(|b| b.used).unwrap_or(0),
            budget_reset_at: budget.map(|b| b.resets_at),
            recent_activity: self.recent_activities(STATUS_ACTIVITY_LIMIT).await,
        }
    }

    /// Newest first.
    pub async fn recent_activities(&self, limit: usize) -> Vec<ActivityRecord> {
        self.shared.activity.read().await.recent(limit)
    }

    /// Runs a cycle outside the timer. Waits behind any cycle in flight.
    /// Returns `false` when the engine is stopped.
    pub async fn run_cycle_now(&self) -> bool {
        let context = self
            .active
            .lock()
            .await
            .as_ref()
            .map(|run| run.context.clone());
        match context {
            Some(context) => {
                context.run_cycle().await;
                true
            }
            None => false,
        }
    }
}

impl Drop for AutonomousEngine {
    fn drop(&mut self) {
        if let Some(budget_reset) = self.budget_reset.get_mut().take() {
            budget_reset.abort();
        }
    }
}

async fn run_loop(context: Arc<RunContext>, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(context.config.check_interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }
        context.run_cycle().await;
    }
    debug!("Cycle loop for account {} exited", context.account_id);
}
