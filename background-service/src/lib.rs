pub mod activity;
pub mod budget;
pub mod cycle;
pub mod engine;
pub mod planner;
pub mod policy;
pub mod studio;

pub use activity::{ActivityLog, ACTIVITY_CAPACITY};
pub use budget::{BudgetStatus, RateBudgetGovernor, BUDGET_WINDOW};
pub use cycle::{EngagementPacing, EngineDeps, MENTION_FETCH_LIMIT, TIMELINE_FETCH_LIMIT};
pub use engine::{AutonomousEngine, EngineStatus, StartOutcome};
pub use planner::{ContentPlan, ContentPlanner, ScheduledDraft};
pub use policy::EngagementPolicy;
pub use studio::{ContentReport, ContentStudio};
