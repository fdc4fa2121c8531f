//! Task and task-assignment query functions.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use subloop_types::{TaskStatus, TaskType, SECONDS_PER_DAY};

use super::{opt_ts, text_enum, ts};
use crate::{DbError, Result};

const TASK_COLUMNS: &str = "t.id, t.campaign_id, t.video_id, t.task_type, t.credits_reward,
     t.created_by, t.status, t.created_at, t.updated_at";

/// A task row.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub campaign_id: String,
    pub video_id: String,
    pub task_type: TaskType,
    pub credits_reward: i64,
    pub created_by: String,
    pub status: TaskStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A task joined with the video it targets.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithVideo {
    #[serde(flatten)]
    pub task: TaskRow,
    pub youtube_id: String,
    pub video_title: String,
    pub channel_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u32,
}

/// A user's assignment to a task.
#[derive(Debug, Clone, Serialize)]
pub struct UserTaskRow {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub credits_earned: i64,
    pub created_at: u64,
    pub completed_at: Option<u64>,
}

/// An assignment joined with its task and video.
#[derive(Debug, Clone, Serialize)]
pub struct UserTaskDetail {
    #[serde(flatten)]
    pub assignment: UserTaskRow,
    pub task_type: TaskType,
    pub credits_reward: i64,
    pub campaign_id: String,
    pub youtube_id: String,
    pub video_title: String,
}

/// Per-type task counts for one campaign.
#[derive(Debug, Clone, Serialize)]
pub struct TypeBreakdown {
    pub task_type: TaskType,
    pub total: u64,
    pub completed: u64,
    pub credits_reward: i64,
}

/// Deliveries for one UTC day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyCompletions {
    pub day: u64,
    pub completions: u64,
    pub credits: i64,
}

/// Fields for a new task.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub id: &'a str,
    pub campaign_id: &'a str,
    pub video_id: &'a str,
    pub task_type: TaskType,
    pub credits_reward: i64,
    pub created_by: &'a str,
}

fn map_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        video_id: row.get(2)?,
        task_type: text_enum(row, 3)?,
        credits_reward: row.get(4)?,
        created_by: row.get(5)?,
        status: text_enum(row, 6)?,
        created_at: ts(row, 7)?,
        updated_at: ts(row, 8)?,
    })
}

fn map_user_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserTaskRow> {
    Ok(UserTaskRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_id: row.get(2)?,
        status: text_enum(row, 3)?,
        credits_earned: row.get(4)?,
        created_at: ts(row, 5)?,
        completed_at: opt_ts(row, 6)?,
    })
}

/// Insert a pending task.
pub fn insert(conn: &Connection, task: &NewTask<'_>, now: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (id, campaign_id, video_id, task_type, credits_reward, created_by,
                            status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
        rusqlite::params![
            task.id,
            task.campaign_id,
            task.video_id,
            task.task_type.as_str(),
            task.credits_reward,
            task.created_by,
            now as i64,
        ],
    )?;
    Ok(())
}

/// Get a task by id.
pub fn get(conn: &Connection, id: &str) -> Result<TaskRow> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1"),
        [id],
        map_task,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("task {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Set a task's status.
pub fn set_status(conn: &Connection, id: &str, status: TaskStatus, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, status.as_str(), now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("task {id}")));
    }
    Ok(())
}

/// Fail every still-open task of a campaign, along with open assignments.
/// Returns the number of tasks failed.
pub fn fail_open_for_campaign(conn: &Connection, campaign_id: &str, now: u64) -> Result<usize> {
    conn.execute(
        "UPDATE user_tasks SET status = 'failed'
         WHERE status IN ('pending', 'in_progress')
           AND task_id IN (SELECT id FROM tasks WHERE campaign_id = ?1)",
        [campaign_id],
    )?;
    let failed = conn.execute(
        "UPDATE tasks SET status = 'failed', updated_at = ?2
         WHERE campaign_id = ?1 AND status IN ('pending', 'in_progress')",
        rusqlite::params![campaign_id, now as i64],
    )?;
    Ok(failed)
}

/// All tasks of a campaign in creation order.
pub fn list_for_campaign(conn: &Connection, campaign_id: &str) -> Result<Vec<TaskRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.campaign_id = ?1
         ORDER BY t.created_at, t.rowid"
    ))?;
    let rows = stmt
        .query_map([campaign_id], map_task)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Pending tasks on active campaigns that `user_id` could take, newest first.
///
/// Excludes the user's own tasks and tasks the user already has an
/// assignment for.
pub fn available_for_user(
    conn: &Connection,
    user_id: &str,
    task_type: Option<TaskType>,
    limit: u32,
) -> Result<Vec<TaskWithVideo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS}, v.youtube_id, v.title, v.channel_name, v.thumbnail_url,
                v.duration_secs
         FROM tasks t
         JOIN campaigns c ON c.id = t.campaign_id
         JOIN videos v ON v.id = t.video_id
         WHERE t.status = 'pending'
           AND c.status = 'active'
           AND t.created_by != ?1
           AND (?2 IS NULL OR t.task_type = ?2)
           AND NOT EXISTS (
               SELECT 1 FROM user_tasks ut WHERE ut.task_id = t.id AND ut.user_id = ?1
           )
         ORDER BY t.created_at DESC, t.rowid DESC
         LIMIT ?3"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![user_id, task_type.map(|t| t.as_str()), limit],
            |row| {
                Ok(TaskWithVideo {
                    task: map_task(row)?,
                    youtube_id: row.get(9)?,
                    video_title: row.get(10)?,
                    channel_name: row.get(11)?,
                    thumbnail_url: row.get(12)?,
                    duration_secs: row.get(13)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Task counts by type for one campaign.
pub fn breakdown_for_campaign(conn: &Connection, campaign_id: &str) -> Result<Vec<TypeBreakdown>> {
    let mut stmt = conn.prepare(
        "SELECT task_type, COUNT(*), SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END),
                MAX(credits_reward)
         FROM tasks WHERE campaign_id = ?1
         GROUP BY task_type
         ORDER BY MAX(credits_reward)",
    )?;
    let rows = stmt
        .query_map([campaign_id], |row| {
            Ok(TypeBreakdown {
                task_type: text_enum(row, 0)?,
                total: row.get::<_, i64>(1)? as u64,
                completed: row.get::<_, i64>(2)? as u64,
                credits_reward: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Completed deliveries per UTC day for one campaign since `since`.
pub fn daily_completions_for_campaign(
    conn: &Connection,
    campaign_id: &str,
    since: u64,
) -> Result<Vec<DailyCompletions>> {
    let mut stmt = conn.prepare(
        "SELECT ut.completed_at / ?3 AS day, COUNT(*), COALESCE(SUM(ut.credits_earned), 0)
         FROM user_tasks ut JOIN tasks t ON t.id = ut.task_id
         WHERE t.campaign_id = ?1 AND ut.status = 'completed' AND ut.completed_at >= ?2
         GROUP BY day ORDER BY day",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![campaign_id, since as i64, SECONDS_PER_DAY as i64],
            |row| {
                Ok(DailyCompletions {
                    day: row.get::<_, i64>(0)? as u64,
                    completions: row.get::<_, i64>(1)? as u64,
                    credits: row.get(2)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// The user's assignment for a task, if any.
pub fn get_assignment(
    conn: &Connection,
    user_id: &str,
    task_id: &str,
) -> Result<Option<UserTaskRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, task_id, status, credits_earned, created_at, completed_at
             FROM user_tasks WHERE user_id = ?1 AND task_id = ?2",
            [user_id, task_id],
            map_user_task,
        )
        .optional()?;
    Ok(row)
}

/// Create an `in_progress` assignment.
pub fn insert_assignment(
    conn: &Connection,
    id: &str,
    user_id: &str,
    task_id: &str,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO user_tasks (id, user_id, task_id, status, created_at)
         VALUES (?1, ?2, ?3, 'in_progress', ?4)",
        rusqlite::params![id, user_id, task_id, now as i64],
    )?;
    Ok(())
}

/// The user holding an open reservation on the task, if any.
pub fn reservation_holder(conn: &Connection, task_id: &str) -> Result<Option<String>> {
    let holder = conn
        .query_row(
            "SELECT user_id FROM user_tasks
             WHERE task_id = ?1 AND status IN ('pending', 'in_progress')
             ORDER BY created_at LIMIT 1",
            [task_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(holder)
}

/// Fail every open assignment on the task except `user_id`'s. Returns the
/// number of assignments failed.
pub fn fail_other_assignments(conn: &Connection, task_id: &str, user_id: &str) -> Result<usize> {
    let failed = conn.execute(
        "UPDATE user_tasks SET status = 'failed'
         WHERE task_id = ?1 AND user_id <> ?2 AND status IN ('pending', 'in_progress')",
        [task_id, user_id],
    )?;
    Ok(failed)
}

/// Mark the user's assignment completed, creating it if needed.
pub fn complete_assignment(
    conn: &Connection,
    id: &str,
    user_id: &str,
    task_id: &str,
    credits_earned: i64,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO user_tasks (id, user_id, task_id, status, credits_earned, created_at,
                                 completed_at)
         VALUES (?1, ?2, ?3, 'completed', ?4, ?5, ?5)
         ON CONFLICT(user_id, task_id) DO UPDATE SET
            status = 'completed',
            credits_earned = excluded.credits_earned,
            completed_at = excluded.completed_at",
        rusqlite::params![id, user_id, task_id, credits_earned, now as i64],
    )?;
    Ok(())
}

/// The user's assignments joined with task and video, newest first.
pub fn list_assignments(
    conn: &Connection,
    user_id: &str,
    status: Option<TaskStatus>,
) -> Result<Vec<UserTaskDetail>> {
    let mut stmt = conn.prepare(
        "SELECT ut.id, ut.user_id, ut.task_id, ut.status, ut.credits_earned, ut.created_at,
                ut.completed_at, t.task_type, t.credits_reward, t.campaign_id,
                v.youtube_id, v.title
         FROM user_tasks ut
         JOIN tasks t ON t.id = ut.task_id
         JOIN videos v ON v.id = t.video_id
         WHERE ut.user_id = ?1 AND (?2 IS NULL OR ut.status = ?2)
         ORDER BY ut.created_at DESC, ut.rowid DESC",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![user_id, status.map(|s| s.as_str())],
            |row| {
                Ok(UserTaskDetail {
                    assignment: map_user_task(row)?,
                    task_type: text_enum(row, 7)?,
                    credits_reward: row.get(8)?,
                    campaign_id: row.get(9)?,
                    youtube_id: row.get(10)?,
                    video_title: row.get(11)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether the user already completed this kind of action on this video
/// through any task.
pub fn has_completed_action(
    conn: &Connection,
    user_id: &str,
    video_id: &str,
    task_type: TaskType,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM user_tasks ut JOIN tasks t ON t.id = ut.task_id
             WHERE ut.user_id = ?1 AND ut.status = 'completed'
               AND t.video_id = ?2 AND t.task_type = ?3
             LIMIT 1",
            rusqlite::params![user_id, video_id, task_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Number of completed tasks, optionally of one type.
pub fn completed_count(
    conn: &Connection,
    user_id: &str,
    task_type: Option<TaskType>,
) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_tasks ut JOIN tasks t ON t.id = ut.task_id
         WHERE ut.user_id = ?1 AND ut.status = 'completed'
           AND (?2 IS NULL OR t.task_type = ?2)",
        rusqlite::params![user_id, task_type.map(|t| t.as_str())],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Number of assignments in a given status.
pub fn assignment_count(conn: &Connection, user_id: &str, status: TaskStatus) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_tasks WHERE user_id = ?1 AND status = ?2",
        rusqlite::params![user_id, status.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Total credits earned through completed tasks.
pub fn total_earned(conn: &Connection, user_id: &str) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(credits_earned), 0) FROM user_tasks
         WHERE user_id = ?1 AND status = 'completed'",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Completion timestamps at or after `since`, ascending.
pub fn completion_times(conn: &Connection, user_id: &str, since: u64) -> Result<Vec<u64>> {
    let mut stmt = conn.prepare(
        "SELECT completed_at FROM user_tasks
         WHERE user_id = ?1 AND status = 'completed' AND completed_at >= ?2
         ORDER BY completed_at",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, since as i64], |row| ts(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
