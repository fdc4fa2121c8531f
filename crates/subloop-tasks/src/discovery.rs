//! Task discovery and assignment.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::tasks::{self, TaskWithVideo, UserTaskDetail, UserTaskRow};
use subloop_db::DbError;
use subloop_types::{TaskStatus, TaskType};

use crate::{Result, TaskError};

pub const DEFAULT_TASK_LIMIT: u32 = 20;
pub const MAX_TASK_LIMIT: u32 = 100;

/// Open tasks the user may take, newest first.
pub fn available_tasks(
    conn: &Connection,
    user_id: &str,
    task_type: Option<TaskType>,
    limit: Option<u32>,
) -> Result<Vec<TaskWithVideo>> {
    let limit = limit
        .filter(|&l| l > 0)
        .unwrap_or(DEFAULT_TASK_LIMIT)
        .min(MAX_TASK_LIMIT);
    Ok(tasks::available_for_user(conn, user_id, task_type, limit)?)
}

/// The user's assignments, optionally filtered by status.
pub fn user_tasks(
    conn: &Connection,
    user_id: &str,
    status: Option<TaskStatus>,
) -> Result<Vec<UserTaskDetail>> {
    Ok(tasks::list_assignments(conn, user_id, status)?)
}

/// Reserve a task for the user.
///
/// Taking the same task twice returns the existing assignment.
pub fn assign_task(
    conn: &Connection,
    user_id: &str,
    task_id: &str,
    now: u64,
) -> Result<UserTaskRow> {
    if let Some(existing) = tasks::get_assignment(conn, user_id, task_id)? {
        return Ok(existing);
    }

    let task = tasks::get(conn, task_id)?;
    if task.created_by == user_id {
        return Err(TaskError::SelfDealing);
    }
    if task.status != TaskStatus::Pending {
        return Err(TaskError::TaskUnavailable(task.status));
    }

    let id = uuid::Uuid::new_v4().to_string();
    tasks::insert_assignment(conn, &id, user_id, task_id, now)?;
    tasks::set_status(conn, task_id, TaskStatus::InProgress, now)?;
    tracing::debug!(user_id, task_id, "task assigned");

    tasks::get_assignment(conn, user_id, task_id)?
        .ok_or_else(|| TaskError::Db(DbError::NotFound(format!("assignment {id}"))))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total_earned: i64,
    pub completed: u64,
    pub in_progress: u64,
}

pub fn task_stats(conn: &Connection, user_id: &str) -> Result<TaskStats> {
    Ok(TaskStats {
        total_earned: tasks::total_earned(conn, user_id)?,
        completed: tasks::assignment_count(conn, user_id, TaskStatus::Completed)?,
        in_progress: tasks::assignment_count(conn, user_id, TaskStatus::InProgress)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;

    #[test]
    fn test_available_and_assign() {
        let (conn, _) = setup(20, 3);
        assert!(available_tasks(&conn, "owner", None, None)
            .expect("own")
            .is_empty());

        let open = available_tasks(&conn, "worker", None, None).expect("open");
        assert_eq!(open.len(), 3);

        let first = assign_task(&conn, "worker", &open[0].task.id, 200).expect("assign");
        assert_eq!(first.status, TaskStatus::InProgress);
        let again = assign_task(&conn, "worker", &open[0].task.id, 300).expect("idempotent");
        assert_eq!(again.id, first.id);

        // Reserved tasks disappear for everyone else.
        assert_eq!(available_tasks(&conn, "worker2", None, None).expect("open").len(), 2);
        assert!(matches!(
            assign_task(&conn, "worker2", &open[0].task.id, 300).expect_err("taken"),
            TaskError::TaskUnavailable(TaskStatus::InProgress)
        ));

        let stats = task_stats(&conn, "worker").expect("stats");
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(user_tasks(&conn, "worker", None).expect("mine").len(), 1);
    }

    #[test]
    fn test_cannot_assign_own_task() {
        let (conn, created) = setup(20, 3);
        let tasks = tasks::list_for_campaign(&conn, &created.campaign.id).expect("tasks");
        assert!(matches!(
            assign_task(&conn, "owner", &tasks[0].id, 200).expect_err("own"),
            TaskError::SelfDealing
        ));
    }

    #[test]
    fn test_filter_by_type() {
        let (conn, _) = setup(20, 3);
        let subs = available_tasks(&conn, "worker", Some(TaskType::Subscribe), Some(10))
            .expect("subs");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].task.credits_reward, 5);
    }
}
