//! Deterministic task risk scoring.
//!
//! [`analyze`] is a pure function of a task snapshot, its recent activity,
//! and a caller-supplied clock: no I/O, same inputs, same result. The
//! composite score adds four signal groups (deadline, priority,
//! stagnation, execution) and clamps to 0..=100. The `signals` block echoes
//! every intermediate input so callers can reconstruct why a score was
//! produced; the AI explanation endpoint feeds on it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ActivityEntry, Priority, Task, TaskStatus};

/// How many recent activity entries feed the stagnation signal.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Inputs echoed for downstream explanation and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSignals {
    pub days_to_due: Option<i64>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub days_since_activity: i64,
    pub total_subtasks: usize,
    pub completed_subtasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub score: u8,
    pub level: RiskLevel,
    pub signals: RiskSignals,
}

/// Whole days from `earlier` to `later`, rounded up.
fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    let millis = (later - earlier).num_milliseconds();
    (millis as f64 / 86_400_000.0).ceil() as i64
}

/// Score a task snapshot against its recent activity.
pub fn analyze(task: &Task, activities: &[ActivityEntry], now: DateTime<Utc>) -> RiskReport {
    let mut score: i32 = 0;

    // Deadline risk (0-40)
    let days_to_due = task.due_date.map(|due| days_between(due, now));
    if let Some(days) = days_to_due {
        score += match days {
            d if d < 0 => 40,
            d if d <= 1 => 35,
            d if d <= 3 => 25,
            d if d <= 7 => 15,
            _ => 0,
        };
    }

    // Priority risk (0-20)
    score += match task.priority {
        Priority::Low => 2,
        Priority::Medium => 6,
        Priority::High => 12,
        Priority::Critical => 20,
    };

    // Stagnation risk (0-20)
    let last_activity_at = activities
        .iter()
        .map(|a| a.created_at)
        .max()
        .unwrap_or(task.updated_at);
    let days_since_activity = days_between(now, last_activity_at);
    if days_since_activity >= 7 {
        score += 20;
    } else if days_since_activity >= 3 {
        score += 12;
    }

    // Execution risk (0-20, two independent bonuses)
    let total_subtasks = task.subtasks.len();
    let completed_subtasks = task.subtasks.iter().filter(|s| s.is_done).count();
    if total_subtasks > 0 && completed_subtasks == 0 {
        score += 10;
    }
    if task.status == TaskStatus::Todo && days_to_due.map_or(false, |d| d <= 2) {
        score += 10;
    }

    let score = score.clamp(0, 100) as u8;
    let level = if score >= 66 {
        RiskLevel::High
    } else if score >= 31 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskReport {
        score,
        level,
        signals: RiskSignals {
            days_to_due,
            priority: task.priority,
            status: task.status,
            days_since_activity,
            total_subtasks,
            completed_subtasks,
        },
    }
}
