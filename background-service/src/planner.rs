use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use signalpost_core::{ContentDraft, RandomSource};
use std::sync::Arc;

/// Local hours at which posts go out.
pub const POSTING_HOURS: [u32; 4] = [9, 13, 18, 21];
pub const PLANNING_DAYS: i64 = 2;
pub const MAX_SLOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledDraft {
    pub draft: ContentDraft,
    pub publish_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentPlan {
    pub scheduled: Vec<ScheduledDraft>,
    /// Drafts that did not get a slot. They are kept, just not scheduled.
    pub unscheduled: Vec<ContentDraft>,
}

/// Spreads drafts over the next few posting slots.
pub struct ContentPlanner {
    random: Arc<dyn RandomSource>,
}

impl ContentPlanner {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Upcoming slots in `now`'s time zone: each posting hour today and
    /// tomorrow at a random minute, strictly after `now`, earliest first.
    pub fn slots<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<DateTime<Tz>> {
        let zone = now.timezone();
        let today = now.date_naive();
        let mut slots = Vec::with_capacity(POSTING_HOURS.len() * PLANNING_DAYS as usize);

        for day in 0..PLANNING_DAYS {
            let date = today + Duration::days(day);
            for hour in POSTING_HOURS {
                let minute = self.random.below(60) as u32;
                // Skips local times that do not exist on DST transition days.
                let slot = date
                    .and_hms_opt(hour, minute, 0)
                    .and_then(|naive| zone.from_local_datetime(&naive).earliest());
                if let Some(slot) = slot {
                    if slot > *now {
                        slots.push(slot);
                    }
                }
            }
        }

        slots.sort();
        slots.truncate(MAX_SLOTS);
        slots
    }

    /// Pairs the most relevant drafts with the earliest slots, one each.
    pub fn plan<Tz: TimeZone>(&self, mut drafts: Vec<ContentDraft>, now: &DateTime<Tz>) -> ContentPlan {
        drafts.sort_by(|a, b| b.source_relevance().total_cmp(&a.source_relevance()));

        let slots = self.slots(now);
        let unscheduled = if drafts.len() > slots.len() {
            drafts.split_off(slots.len())
        } else {
            Vec::new()
        };

        let scheduled = drafts
            .into_iter()
            .zip(slots)
            .map(|(draft, slot)| ScheduledDraft {
                draft,
                publish_at: slot.with_timezone(&Utc),
            })
            .collect();

        ContentPlan {
            scheduled,
            unscheduled,
        }
    }
}
