//! Content reports.

use rusqlite::Connection;
use subloop_db::queries::moderation::{self, ReportRow};
use subloop_types::{ContentType, ReportStatus};

use crate::queue::auto_flag;
use crate::{clean_text, ModerationError, Result};

const MAX_REASON_CHARS: usize = 500;
const MAX_DESCRIPTION_CHARS: usize = 2_000;
const MAX_CONTENT_ID_CHARS: usize = 200;

/// Pending reports beyond this count auto-flag the content.
pub const AUTO_FLAG_REPORT_COUNT: usize = 2;

pub const MAX_REPORT_LIMIT: u32 = 200;

#[derive(Debug, Clone)]
pub struct NewReport<'a> {
    pub reporter_id: &'a str,
    pub content_type: ContentType,
    pub content_id: &'a str,
    pub reason: &'a str,
    pub description: Option<&'a str>,
}

/// File a report. Content with more than two pending reports is queued.
pub fn create_report(conn: &Connection, report: &NewReport<'_>, now: u64) -> Result<ReportRow> {
    let content_id = clean_text(
        "content id",
        Some(report.content_id),
        MAX_CONTENT_ID_CHARS,
        true,
    )?
    .unwrap_or_default();
    let reason = clean_text("reason", Some(report.reason), MAX_REASON_CHARS, true)?
        .unwrap_or_default();
    let description = clean_text(
        "description",
        report.description,
        MAX_DESCRIPTION_CHARS,
        false,
    )?;

    let id = uuid::Uuid::new_v4().to_string();
    moderation::insert_report(
        conn,
        &id,
        report.reporter_id,
        report.content_type,
        &content_id,
        &reason,
        description.as_deref(),
        now,
    )?;
    tracing::info!(
        reporter = report.reporter_id,
        content_type = %report.content_type,
        content_id = %content_id,
        "report filed"
    );

    let pending = moderation::pending_reports_for(conn, report.content_type, &content_id)?;
    if pending.len() > AUTO_FLAG_REPORT_COUNT {
        let reasons = vec![
            "multiple_reports".to_string(),
            format!("report_count:{}", pending.len()),
        ];
        auto_flag(conn, report.content_type, &content_id, &reasons, now)?;
    }

    Ok(moderation::get_report(conn, &id)?)
}

/// Record a review decision on a report.
pub fn review_report(
    conn: &Connection,
    report_id: &str,
    reviewer: &str,
    status: ReportStatus,
    notes: Option<&str>,
    now: u64,
) -> Result<ReportRow> {
    if status == ReportStatus::Pending {
        return Err(ModerationError::InvalidDecision(status.to_string()));
    }
    let notes = clean_text("resolution notes", notes, MAX_DESCRIPTION_CHARS, false)?;
    moderation::review_report(conn, report_id, reviewer, status, notes.as_deref(), now)?;
    tracing::info!(report_id, reviewer, %status, "report reviewed");
    Ok(moderation::get_report(conn, report_id)?)
}

/// Reports filed by a user.
pub fn user_reports(conn: &Connection, user_id: &str) -> Result<Vec<ReportRow>> {
    Ok(moderation::reports_by_reporter(conn, user_id)?)
}

/// All reports, newest first.
pub fn all_reports(conn: &Connection, limit: u32) -> Result<Vec<ReportRow>> {
    Ok(moderation::all_reports(conn, limit.clamp(1, MAX_REPORT_LIMIT))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;

    fn report<'a>(reporter: &'a str, content_id: &'a str) -> NewReport<'a> {
        NewReport {
            reporter_id: reporter,
            content_type: ContentType::Video,
            content_id,
            reason: "  misleading title ",
            description: None,
        }
    }

    #[test]
    fn test_create_report_trims() {
        let conn = setup();
        let r = create_report(&conn, &report("u1", "v1"), 10).expect("report");
        assert_eq!(r.reason, "misleading title");
        assert_eq!(r.status, ReportStatus::Pending);
        assert_eq!(user_reports(&conn, "u1").expect("mine").len(), 1);
    }

    #[test]
    fn test_validation() {
        let conn = setup();
        let mut bad = report("u1", "v1");
        bad.reason = " ";
        assert!(matches!(
            create_report(&conn, &bad, 10).expect_err("empty reason"),
            ModerationError::InvalidField { field: "reason", .. }
        ));

        let long = "x".repeat(MAX_REASON_CHARS + 1);
        let mut bad = report("u1", "v1");
        bad.reason = &long;
        assert!(create_report(&conn, &bad, 10).is_err());
    }

    #[test]
    fn test_third_report_auto_flags() {
        let conn = setup();
        create_report(&conn, &report("u1", "v1"), 10).expect("r1");
        create_report(&conn, &report("u2", "v1"), 11).expect("r2");
        assert!(moderation::queue_item_for(&conn, ContentType::Video, "v1")
            .expect("lookup")
            .is_none());

        create_report(&conn, &report("u3", "v1"), 12).expect("r3");
        let item = moderation::queue_item_for(&conn, ContentType::Video, "v1")
            .expect("lookup")
            .expect("queued");
        assert!(item.auto_flagged);
        assert!(item.flag_reasons.contains(&"multiple_reports".to_string()));
    }

    #[test]
    fn test_review_report() {
        let conn = setup();
        let r = create_report(&conn, &report("u1", "v1"), 10).expect("report");
        let reviewed = review_report(&conn, &r.id, "admin", ReportStatus::Resolved, Some("ok"), 20)
            .expect("review");
        assert_eq!(reviewed.status, ReportStatus::Resolved);
        assert_eq!(reviewed.reviewed_at, Some(20));
        assert_eq!(all_reports(&conn, 10).expect("all").len(), 1);

        assert!(review_report(&conn, &r.id, "admin", ReportStatus::Pending, None, 30).is_err());
    }
}
