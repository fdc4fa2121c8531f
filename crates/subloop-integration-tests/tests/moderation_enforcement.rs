//! Integration test: reports, the moderation queue and ban enforcement.
//!
//! Exercises the report -> queue -> ban -> appeal pipeline:
//! 1. Several users report the same video until it is auto-flagged
//! 2. A moderator decides the queue item and resolves the reports
//! 3. A temporary ban blocks task completion until it expires
//! 4. A permanent ban is appealed, approved, and stops applying

use rusqlite::Connection;
use subloop_campaign::catalog::VideoInput;
use subloop_campaign::{create_campaign, CreateCampaign, PlanLimits};
use subloop_db::queries::{profiles, tasks};
use subloop_moderation::{
    active_ban, ban_user, create_report, moderate_content, moderation_queue, process_appeal,
    review_report, submit_appeal, BanRequest, ModerationError, NewReport,
};
use subloop_tasks::{complete_task, CatalogVerifier, CompletionPolicy, CompletionRequest, TaskError};
use subloop_types::{
    AppealStatus, BanType, ContentType, QueueStatus, ReportStatus, TransactionType,
    SECONDS_PER_DAY,
};

/// Simulated timestamp for deterministic testing.
const TEST_TIMESTAMP: u64 = 1_700_000_000;

const VIDEO_URL: &str = "https://youtu.be/9bZkp7q19f0";

fn open_with_users() -> Connection {
    let conn = subloop_db::open_memory().expect("In-memory DB should open");
    for id in ["owner", "mod", "w1", "w2", "w3"] {
        profiles::insert(&conn, id, id, None, TEST_TIMESTAMP).expect("profile");
    }
    conn
}

/// A funded campaign with `target` open tasks. Returns the task ids.
fn open_tasks(conn: &mut Connection, target: u32) -> Vec<String> {
    subloop_ledger::add_credits(
        conn,
        "owner",
        100,
        TransactionType::SignupBonus,
        None,
        None,
        TEST_TIMESTAMP,
    )
    .expect("fund");
    let created = create_campaign(
        conn,
        &CreateCampaign {
            owner_id: "owner".into(),
            title: "Dance video".into(),
            description: None,
            video: VideoInput {
                url: VIDEO_URL.into(),
                channel_id: Some("UCrDkAvwZum-UTjHmzDI2iIw".into()),
                ..Default::default()
            },
            credits_allocated: 50,
            target_actions: target,
        },
        &PlanLimits::default(),
        TEST_TIMESTAMP,
    )
    .expect("campaign");
    tasks::list_for_campaign(conn, &created.campaign.id)
        .expect("tasks")
        .into_iter()
        .map(|t| t.id)
        .collect()
}

fn complete(
    conn: &mut Connection,
    user_id: &str,
    task_id: &str,
    now: u64,
) -> Result<subloop_tasks::CompletionOutcome, TaskError> {
    complete_task(
        conn,
        &CatalogVerifier,
        &CompletionRequest {
            user_id,
            task_id,
            ip_address: "198.51.100.4",
            device_fingerprint: "browser-1",
        },
        &CompletionPolicy::default(),
        now,
    )
}

#[test]
fn repeated_reports_queue_content_for_review() {
    let conn = open_with_users();

    // =========================================================
    // Step 1: Two reports leave the content unqueued
    // =========================================================
    let mut report_ids = Vec::new();
    for (i, reporter) in ["w1", "w2", "w3"].iter().enumerate() {
        let row = create_report(
            &conn,
            &NewReport {
                reporter_id: reporter,
                content_type: ContentType::Video,
                content_id: "9bZkp7q19f0",
                reason: "misleading",
                description: Some("title does not match"),
            },
            TEST_TIMESTAMP + i as u64,
        )
        .expect("Report should be filed");
        assert_eq!(row.status, ReportStatus::Pending);
        report_ids.push(row.id);

        let queued = moderation_queue(&conn, None, Some(QueueStatus::Pending), None)
            .expect("queue");
        if i < 2 {
            assert!(queued.is_empty(), "queued after {} reports", i + 1);
        }
    }

    // =========================================================
    // Step 2: The third report auto-flags
    // =========================================================
    let queue = moderation_queue(&conn, None, Some(QueueStatus::Pending), None).expect("queue");
    assert_eq!(queue.len(), 1);
    let item = &queue[0];
    assert!(item.auto_flagged);
    assert_eq!(item.content_id, "9bZkp7q19f0");
    assert_eq!(item.flag_reasons, vec!["multiple_reports", "report_count:3"]);

    // =========================================================
    // Step 3: A moderator decides the item and the reports
    // =========================================================
    let decided = moderate_content(
        &conn,
        &item.id,
        "mod",
        QueueStatus::Rejected,
        Some("content removed"),
        TEST_TIMESTAMP + 60,
    )
    .expect("Decision should be recorded");
    assert_eq!(decided.status, QueueStatus::Rejected);
    assert_eq!(decided.reviewed_by.as_deref(), Some("mod"));

    let err = moderate_content(&conn, &item.id, "mod", QueueStatus::Pending, None, TEST_TIMESTAMP)
        .expect_err("pending is not a decision");
    assert!(matches!(err, ModerationError::InvalidDecision(_)));

    for id in &report_ids {
        let row = review_report(&conn, id, "mod", ReportStatus::Resolved, None, TEST_TIMESTAMP + 90)
            .expect("Report review should succeed");
        assert_eq!(row.status, ReportStatus::Resolved);
    }
    assert!(moderation_queue(&conn, None, Some(QueueStatus::Pending), None)
        .expect("queue")
        .is_empty());
}

#[test]
fn temporary_ban_blocks_completion_until_expiry() {
    let mut conn = open_with_users();
    let ids = open_tasks(&mut conn, 3);

    let ban = ban_user(
        &conn,
        &BanRequest {
            user_id: "w1",
            banned_by: "mod",
            reason: "bot activity",
            ban_type: BanType::Temporary,
            expires_at: Some(TEST_TIMESTAMP + SECONDS_PER_DAY),
        },
        TEST_TIMESTAMP,
    )
    .expect("Ban should be placed");

    let err = complete(&mut conn, "w1", &ids[0], TEST_TIMESTAMP + 60)
        .expect_err("banned user must be refused");
    assert!(
        matches!(
            &err,
            TaskError::Banned { ban_id, expires_at }
                if *ban_id == ban.id && *expires_at == Some(TEST_TIMESTAMP + SECONDS_PER_DAY)
        ),
        "expected the ban to be reported, got {err:?}"
    );
    assert_eq!(profiles::credits(&conn, "w1").expect("credits"), 0);

    // After expiry the same completion goes through.
    let later = TEST_TIMESTAMP + SECONDS_PER_DAY + 60;
    assert!(active_ban(&conn, "w1", later).expect("ban lookup").is_none());
    complete(&mut conn, "w1", &ids[0], later).expect("Completion after expiry should succeed");
}

#[test]
fn approved_appeal_lifts_permanent_ban() {
    let mut conn = open_with_users();
    let ids = open_tasks(&mut conn, 3);

    let ban = ban_user(
        &conn,
        &BanRequest {
            user_id: "w2",
            banned_by: "mod",
            reason: "spam reports",
            ban_type: BanType::Permanent,
            expires_at: None,
        },
        TEST_TIMESTAMP,
    )
    .expect("Ban should be placed");
    assert!(ban.expires_at.is_none());

    // Only the ban holder can appeal.
    let err = submit_appeal(&conn, &ban.id, "w3", "not me", TEST_TIMESTAMP + 10)
        .expect_err("stranger appeal");
    assert!(matches!(err, ModerationError::NotBanHolder));

    let appealed = submit_appeal(&conn, &ban.id, "w2", "It was a mistake", TEST_TIMESTAMP + 10)
        .expect("Appeal should be accepted");
    assert_eq!(appealed.appeal_status, Some(AppealStatus::Pending));

    // Still banned while the appeal is pending.
    let err = complete(&mut conn, "w2", &ids[0], TEST_TIMESTAMP + 20)
        .expect_err("pending appeal does not lift the ban");
    assert!(matches!(err, TaskError::Banned { .. }));

    let decided = process_appeal(&conn, &ban.id, AppealStatus::Approved, "mod", TEST_TIMESTAMP + 30)
        .expect("Approval should succeed");
    assert_eq!(decided.appeal_status, Some(AppealStatus::Approved));
    assert!(active_ban(&conn, "w2", TEST_TIMESTAMP + 40).expect("lookup").is_none());

    let outcome = complete(&mut conn, "w2", &ids[0], TEST_TIMESTAMP + 60)
        .expect("Completion after approval should succeed");
    assert_eq!(outcome.credits_awarded, 1);
}
