//! Achievement catalog and unlocks.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::{achievements, profiles, tasks};
use subloop_ledger::add_credits;
use subloop_types::{TaskType, TransactionType};

use crate::Result;

/// Credits paid for each unlocked achievement.
pub const ACHIEVEMENT_BONUS: i64 = 50;

/// What an achievement counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TasksCompleted,
    StreakDays,
    SubscribeTasks,
    LikeTasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub requirement: u64,
}

pub static ACHIEVEMENTS: [Achievement; 8] = [
    Achievement {
        id: "first_task",
        name: "Getting Started",
        description: "Complete your first task",
        metric: Metric::TasksCompleted,
        requirement: 1,
    },
    Achievement {
        id: "task_master",
        name: "Task Master",
        description: "Complete 10 tasks",
        metric: Metric::TasksCompleted,
        requirement: 10,
    },
    Achievement {
        id: "dedicated_earner",
        name: "Dedicated Earner",
        description: "Complete 50 tasks",
        metric: Metric::TasksCompleted,
        requirement: 50,
    },
    Achievement {
        id: "super_user",
        name: "Super User",
        description: "Complete 100 tasks",
        metric: Metric::TasksCompleted,
        requirement: 100,
    },
    Achievement {
        id: "week_streak",
        name: "Week Warrior",
        description: "Check in 7 days in a row",
        metric: Metric::StreakDays,
        requirement: 7,
    },
    Achievement {
        id: "month_streak",
        name: "Monthly Master",
        description: "Check in 30 days in a row",
        metric: Metric::StreakDays,
        requirement: 30,
    },
    Achievement {
        id: "subscriber_specialist",
        name: "Subscriber Specialist",
        description: "Complete 20 subscribe tasks",
        metric: Metric::SubscribeTasks,
        requirement: 20,
    },
    Achievement {
        id: "like_legend",
        name: "Like Legend",
        description: "Complete 50 like tasks",
        metric: Metric::LikeTasks,
        requirement: 50,
    },
];

/// Look up a catalog entry.
pub fn find(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

/// Current value of every metric for a user.
#[derive(Debug, Clone, Copy, Default)]
struct Metrics {
    tasks: u64,
    streak: u64,
    subscribes: u64,
    likes: u64,
}

impl Metrics {
    fn load(conn: &Connection, user_id: &str) -> Result<Self> {
        let profile = profiles::get(conn, user_id)?;
        Ok(Self {
            tasks: tasks::completed_count(conn, user_id, None)?,
            streak: u64::from(profile.streak_count),
            subscribes: tasks::completed_count(conn, user_id, Some(TaskType::Subscribe))?,
            likes: tasks::completed_count(conn, user_id, Some(TaskType::Like))?,
        })
    }

    fn value(&self, metric: Metric) -> u64 {
        match metric {
            Metric::TasksCompleted => self.tasks,
            Metric::StreakDays => self.streak,
            Metric::SubscribeTasks => self.subscribes,
            Metric::LikeTasks => self.likes,
        }
    }
}

/// Unlock every achievement the user now qualifies for and pay the bonus
/// for each. Returns only the newly unlocked ones.
pub fn check_achievements(
    conn: &Connection,
    user_id: &str,
    now: u64,
) -> Result<Vec<&'static Achievement>> {
    let metrics = Metrics::load(conn, user_id)?;
    let mut unlocked = Vec::new();

    for achievement in ACHIEVEMENTS.iter() {
        if metrics.value(achievement.metric) < achievement.requirement {
            continue;
        }
        if !achievements::unlock(conn, user_id, achievement.id, now)? {
            continue;
        }
        add_credits(
            conn,
            user_id,
            ACHIEVEMENT_BONUS,
            TransactionType::AchievementBonus,
            Some(&format!("Achievement bonus: {}", achievement.name)),
            Some(achievement.id),
            now,
        )?;
        tracing::info!(user_id, achievement = achievement.id, "achievement unlocked");
        unlocked.push(achievement);
    }

    Ok(unlocked)
}

/// An achievement with the user's standing against it.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub current: u64,
    pub unlocked_at: Option<u64>,
}

/// The full catalog annotated for one user.
pub fn achievement_status(conn: &Connection, user_id: &str) -> Result<Vec<AchievementStatus>> {
    let metrics = Metrics::load(conn, user_id)?;
    let unlocked = achievements::list(conn, user_id)?;
    Ok(ACHIEVEMENTS
        .iter()
        .map(|a| AchievementStatus {
            achievement: *a,
            current: metrics.value(a.metric).min(a.requirement),
            unlocked_at: unlocked
                .iter()
                .find(|u| u.achievement_id == a.id)
                .map(|u| u.unlocked_at),
        })
        .collect())
}
