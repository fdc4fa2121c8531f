//! The task verification seam.
//!
//! The daemon cannot observe whether a user really watched, liked or
//! subscribed on YouTube. Verification is therefore a trait, and the default
//! implementation only checks what the catalog knows.

use serde::Serialize;
use subloop_db::queries::tasks::TaskRow;
use subloop_db::queries::videos::VideoRow;
use subloop_types::TaskType;

use crate::Result;

/// Everything a verifier may inspect about a completion attempt.
#[derive(Debug, Clone, Serialize)]
pub struct TaskContext {
    pub user_id: String,
    pub task: TaskRow,
    /// The task's video, if it is still in the catalog.
    pub video: Option<VideoRow>,
    pub ip_address: String,
    pub device_fingerprint: String,
}

/// Decides whether a claimed action happened.
pub trait TaskVerifier: Send + Sync {
    fn verify(&self, ctx: &TaskContext) -> Result<bool>;
}

/// Accepts a task when its video is catalogued, and for subscribe tasks
/// only when the video's channel is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogVerifier;

impl TaskVerifier for CatalogVerifier {
    fn verify(&self, ctx: &TaskContext) -> Result<bool> {
        let Some(video) = &ctx.video else {
            return Ok(false);
        };
        Ok(match ctx.task.task_type {
            TaskType::Subscribe => video.channel_id.as_deref().is_some_and(|c| !c.is_empty()),
            TaskType::Watch | TaskType::Like => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subloop_types::TaskStatus;

    fn ctx(task_type: TaskType, channel_id: Option<&str>, with_video: bool) -> TaskContext {
        TaskContext {
            user_id: "worker".into(),
            task: TaskRow {
                id: "t1".into(),
                campaign_id: "c1".into(),
                video_id: "v1".into(),
                task_type,
                credits_reward: 1,
                created_by: "owner".into(),
                status: TaskStatus::Pending,
                created_at: 0,
                updated_at: 0,
            },
            video: with_video.then(|| VideoRow {
                id: "v1".into(),
                youtube_id: "dQw4w9WgXcQ".into(),
                title: "Video".into(),
                description: None,
                channel_name: None,
                channel_id: channel_id.map(str::to_string),
                thumbnail_url: None,
                duration_secs: 0,
                created_at: 0,
                updated_at: 0,
            }),
            ip_address: "10.0.0.1".into(),
            device_fingerprint: "dev".into(),
        }
    }

    #[test]
    fn test_catalog_verifier() {
        let v = CatalogVerifier;
        assert!(v.verify(&ctx(TaskType::Watch, None, true)).expect("verify"));
        assert!(!v.verify(&ctx(TaskType::Watch, None, false)).expect("verify"));
        assert!(!v.verify(&ctx(TaskType::Subscribe, None, true)).expect("verify"));
        assert!(v
            .verify(&ctx(TaskType::Subscribe, Some("UC123"), true))
            .expect("verify"));
    }
}
