//! Per-campaign reporting.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::campaigns::{self, CampaignRow};
use subloop_db::queries::tasks::{self, DailyCompletions, TypeBreakdown};
use subloop_types::{day_of, SECONDS_PER_DAY};

use crate::Result;

/// Maximum number of days for [`performance`].
pub const MAX_PERFORMANCE_DAYS: u32 = 90;

#[derive(Debug, Clone, Serialize)]
pub struct CampaignAnalytics {
    pub campaign: CampaignRow,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub credits_spent: i64,
    /// Percentage of tasks completed, rounded to two decimals.
    pub completion_rate: f64,
    pub remaining_credits: i64,
    pub by_type: Vec<TypeBreakdown>,
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Task completion summary for one campaign.
pub fn analytics(conn: &Connection, campaign_id: &str) -> Result<CampaignAnalytics> {
    let campaign = campaigns::get(conn, campaign_id)?;
    let by_type = tasks::breakdown_for_campaign(conn, campaign_id)?;

    let total_tasks: u64 = by_type.iter().map(|b| b.total).sum();
    let completed_tasks: u64 = by_type.iter().map(|b| b.completed).sum();
    let completion_rate = if total_tasks == 0 {
        0.0
    } else {
        round2(completed_tasks as f64 / total_tasks as f64 * 100.0)
    };

    Ok(CampaignAnalytics {
        total_tasks,
        completed_tasks,
        credits_spent: campaign.credits_spent,
        completion_rate,
        remaining_credits: campaign.remaining_credits(),
        by_type,
        campaign,
    })
}

/// Deliveries per UTC day for the last `days` days including today,
/// oldest first, with empty days reported as zero.
pub fn performance(
    conn: &Connection,
    campaign_id: &str,
    days: u32,
    now: u64,
) -> Result<Vec<DailyCompletions>> {
    // Surface NotFound for unknown campaigns rather than an empty chart.
    campaigns::get(conn, campaign_id)?;

    let days = u64::from(days.clamp(1, MAX_PERFORMANCE_DAYS));
    let today = day_of(now);
    let first_day = today.saturating_sub(days - 1);

    let mut recorded = tasks::daily_completions_for_campaign(
        conn,
        campaign_id,
        first_day * SECONDS_PER_DAY,
    )?
    .into_iter()
    .peekable();

    Ok((first_day..=today)
        .map(|day| {
            recorded.next_if(|r| r.day == day).unwrap_or(DailyCompletions {
                day,
                completions: 0,
                credits: 0,
            })
        })
        .collect())
}
