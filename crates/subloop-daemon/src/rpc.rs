//! JSON-RPC 2.0 envelopes, error codes and method dispatch.
//!
//! The transport (see [`crate::http`]) authenticates the request and
//! resolves the [`Caller`]; everything here runs on behalf of that caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use subloop_campaign::CampaignError;
use subloop_db::DbError;
use subloop_fraud::FraudError;
use subloop_gamification::GamificationError;
use subloop_ledger::LedgerError;
use subloop_moderation::ModerationError;
use subloop_referral::ReferralError;
use subloop_tasks::TaskError;
use subloop_types::Role;
use tracing::{debug, warn};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The authenticated account a request runs as.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
    /// Remote address as seen by the HTTP listener.
    pub ip_address: String,
    /// `X-Device-Fingerprint` header, if the client sent one.
    pub device_fingerprint: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    fn with_detail(code: i32, message: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(code, message, Some(json!({ "detail": detail.to_string() })))
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request(detail: &str) -> Self {
        Self::with_detail(-32600, "INVALID_REQUEST", detail)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, "METHOD_NOT_FOUND", Some(json!({ "method": method })))
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::with_detail(-32603, "INTERNAL_ERROR", detail)
    }

    // Access

    /// Missing or invalid bearer token (-32001).
    pub fn unauthorized(detail: &str) -> Self {
        Self::with_detail(-32001, "UNAUTHORIZED", detail)
    }

    /// Caller lacks the role or ownership required (-32003).
    pub fn forbidden(detail: &str) -> Self {
        Self::with_detail(-32003, "FORBIDDEN", detail)
    }

    /// Not found (-32004).
    pub fn not_found(detail: &str) -> Self {
        Self::with_detail(-32004, "NOT_FOUND", detail)
    }

    /// Account has an active ban (-32010).
    pub fn banned(ban_id: &str, expires_at: Option<u64>) -> Self {
        Self::new(
            -32010,
            "USER_BANNED",
            Some(json!({ "ban_id": ban_id, "expires_at": expires_at })),
        )
    }

    // Credits

    /// Insufficient credits (-32040).
    pub fn insufficient_credits(required: i64, available: i64) -> Self {
        Self::new(
            -32040,
            "INSUFFICIENT_CREDITS",
            Some(json!({ "required": required, "available": available })),
        )
    }

    /// Balance arithmetic overflowed (-32041).
    pub fn credit_overflow() -> Self {
        Self::new(-32041, "CREDIT_OVERFLOW", None)
    }

    /// Campaign budget cannot cover the payout (-32042).
    pub fn budget_exceeded(required: i64, allocated: i64) -> Self {
        Self::new(
            -32042,
            "BUDGET_EXCEEDED",
            Some(json!({ "required": required, "allocated": allocated })),
        )
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

// Domain error mapping

impl From<DbError> for RpcError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => RpcError::not_found(&what),
            ref err if err.is_constraint_violation() => RpcError::invalid_params(&err.to_string()),
            other => {
                warn!(error = %other, "database error");
                RpcError::internal_error(&format!("db error: {other}"))
            }
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Db(e) => e.into(),
            LedgerError::ZeroAmount => RpcError::invalid_params("amount must not be zero"),
            LedgerError::InsufficientCredits {
                required,
                available,
            } => RpcError::insufficient_credits(required, available),
            LedgerError::Overflow => RpcError::credit_overflow(),
        }
    }
}

impl From<CampaignError> for RpcError {
    fn from(e: CampaignError) -> Self {
        match e {
            CampaignError::Db(e) => e.into(),
            CampaignError::Ledger(e) => e.into(),
            CampaignError::BudgetExceeded {
                required,
                allocated,
            } => RpcError::budget_exceeded(required, allocated),
            CampaignError::TargetReached { target } => RpcError::new(
                -32052,
                "CAMPAIGN_TARGET_REACHED",
                Some(json!({ "target": target })),
            ),
            CampaignError::Inactive(status) => campaign_inactive(status),
            CampaignError::InvalidTransition { from, to } => RpcError::new(
                -32054,
                "INVALID_STATUS_TRANSITION",
                Some(json!({ "from": from, "to": to })),
            ),
            CampaignError::NotOwner => RpcError::forbidden("not the campaign owner"),
            invalid @ (CampaignError::InvalidUrl(_)
            | CampaignError::InvalidTitle(_)
            | CampaignError::InvalidDescription(_)
            | CampaignError::InvalidTarget { .. }
            | CampaignError::InvalidBudget { .. }) => {
                RpcError::invalid_params(&invalid.to_string())
            }
        }
    }
}

fn campaign_inactive(status: subloop_types::CampaignStatus) -> RpcError {
    RpcError::new(
        -32053,
        "CAMPAIGN_INACTIVE",
        Some(json!({ "status": status })),
    )
}

impl From<GamificationError> for RpcError {
    fn from(e: GamificationError) -> Self {
        match e {
            GamificationError::Db(e) => e.into(),
            GamificationError::Ledger(e) => e.into(),
        }
    }
}

impl From<FraudError> for RpcError {
    fn from(e: FraudError) -> Self {
        match e {
            FraudError::Db(e) => e.into(),
            invalid @ FraudError::InvalidField { .. } => {
                RpcError::invalid_params(&invalid.to_string())
            }
        }
    }
}

impl From<TaskError> for RpcError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::Db(e) => e.into(),
            TaskError::Ledger(e) => e.into(),
            TaskError::Campaign(e) => e.into(),
            TaskError::Gamification(e) => e.into(),
            TaskError::Fraud(e) => e.into(),
            TaskError::Moderation(e) => e.into(),
            TaskError::Banned { ban_id, expires_at } => RpcError::banned(&ban_id, expires_at),
            TaskError::TaskAlreadyCompleted => {
                RpcError::new(-32050, "TASK_ALREADY_COMPLETED", None)
            }
            TaskError::TaskUnavailable(status) => RpcError::new(
                -32051,
                "TASK_UNAVAILABLE",
                Some(json!({ "status": status })),
            ),
            TaskError::CampaignInactive(status) => campaign_inactive(status),
            TaskError::SelfDealing => RpcError::new(-32055, "SELF_DEALING", None),
            TaskError::AlreadyCompletedByUser => {
                RpcError::new(-32056, "ALREADY_COMPLETED_BY_USER", None)
            }
            TaskError::DuplicateAction => RpcError::new(-32057, "DUPLICATE_ACTION", None),
            TaskError::VerificationFailed => RpcError::new(-32058, "VERIFICATION_FAILED", None),
            TaskError::RateLimited { count, limit } => RpcError::new(
                -32060,
                "RATE_LIMITED",
                Some(json!({ "count": count, "limit": limit })),
            ),
            TaskError::FraudSuspected { risk_score } => RpcError::new(
                -32061,
                "FRAUD_SUSPECTED",
                Some(json!({ "risk_score": risk_score })),
            ),
        }
    }
}

impl From<ModerationError> for RpcError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::Db(e) => e.into(),
            ModerationError::SelfBan => RpcError::new(-32070, "SELF_BAN", None),
            ModerationError::AppealExists(status) => RpcError::new(
                -32071,
                "APPEAL_EXISTS",
                Some(json!({ "appeal_status": status })),
            ),
            ModerationError::NoPendingAppeal => RpcError::new(-32072, "NO_PENDING_APPEAL", None),
            ModerationError::NotBanHolder => {
                RpcError::forbidden("only the banned user may appeal this ban")
            }
            invalid @ (ModerationError::InvalidField { .. }
            | ModerationError::InvalidExpiry
            | ModerationError::InvalidDecision(_)) => {
                RpcError::invalid_params(&invalid.to_string())
            }
        }
    }
}

impl From<ReferralError> for RpcError {
    fn from(e: ReferralError) -> Self {
        match e {
            ReferralError::Db(e) => e.into(),
            ReferralError::Ledger(e) => e.into(),
            ReferralError::InvalidCode => RpcError::new(-32073, "INVALID_REFERRAL_CODE", None),
            ReferralError::SelfReferral => RpcError::new(-32074, "SELF_REFERRAL", None),
            ReferralError::AlreadyReferred => RpcError::new(-32075, "ALREADY_REFERRED", None),
            gen @ ReferralError::CodeGenerationFailed(_) => {
                RpcError::internal_error(&gen.to_string())
            }
        }
    }
}

impl From<rusqlite::Error> for RpcError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::Sqlite(e).into()
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::internal_error(&format!("serialization error: {e}"))
    }
}

/// Methods restricted to admins.
fn requires_admin(method: &str) -> bool {
    matches!(
        method,
        "review_report"
            | "ban_user"
            | "unban_user"
            | "process_appeal"
            | "get_moderation_queue"
            | "moderate_content"
            | "get_all_reports"
            | "get_all_bans"
            | "get_fraud_analytics"
            | "admin_add_credits"
            | "audit_ledger"
            | "set_user_role"
    )
}

/// Methods a banned account may still call: reads and the appeal.
fn allowed_while_banned(method: &str) -> bool {
    matches!(
        method,
        "get_profile"
            | "get_user_role"
            | "get_credit_balance"
            | "get_transaction_history"
            | "get_credit_stats"
            | "get_earnings_chart"
            | "list_videos"
            | "search_videos"
            | "get_video"
            | "get_popular_videos"
            | "parse_video_url"
            | "get_campaign_analytics"
            | "get_campaign_performance"
            | "get_my_campaigns"
            | "get_active_campaigns"
            | "preview_campaign_plan"
            | "get_available_tasks"
            | "get_my_tasks"
            | "get_task_stats"
            | "get_progress"
            | "get_achievements"
            | "get_leaderboard"
            | "check_spam"
            | "get_my_reports"
            | "get_my_bans"
            | "check_user_banned"
            | "submit_appeal"
            | "get_referral_stats"
            | "validate_referral_code"
            | "get_referral_events"
    )
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(
    state: &Arc<DaemonState>,
    caller: &Caller,
    request: RpcRequest,
) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request("jsonrpc must be \"2.0\""));
    }

    let method = request.method.as_str();
    debug!(method, user_id = %caller.user_id, "dispatching RPC method");

    match guard(state, caller, method).await {
        Ok(()) => {}
        Err(err) => return RpcResponse::error(id, err),
    }

    let params = &request.params;
    let result = match method {
        // Profile
        "get_profile" => commands::profile::get_profile(state, caller).await,
        "update_profile" => commands::profile::update_profile(state, caller, params).await,
        "get_user_role" => commands::profile::get_user_role(state, caller).await,

        // Credits
        "get_credit_balance" => commands::credits::get_credit_balance(state, caller).await,
        "get_transaction_history" => {
            commands::credits::get_transaction_history(state, caller, params).await
        }
        "get_credit_stats" => commands::credits::get_credit_stats(state, caller).await,
        "get_earnings_chart" => commands::credits::get_earnings_chart(state, caller, params).await,
        "admin_add_credits" => commands::credits::admin_add_credits(state, caller, params).await,
        "audit_ledger" => commands::credits::audit_ledger(state).await,

        // Videos
        "list_videos" => commands::videos::list_videos(state, params).await,
        "search_videos" => commands::videos::search_videos(state, params).await,
        "get_video" => commands::videos::get_video(state, params).await,
        "get_popular_videos" => commands::videos::get_popular_videos(state, params).await,
        "parse_video_url" => commands::videos::parse_video_url(params),

        // Campaigns
        "create_campaign" => commands::campaigns::create_campaign(state, caller, params).await,
        "update_campaign_status" => {
            commands::campaigns::update_campaign_status(state, caller, params).await
        }
        "get_campaign_analytics" => {
            commands::campaigns::get_campaign_analytics(state, caller, params).await
        }
        "get_campaign_performance" => {
            commands::campaigns::get_campaign_performance(state, caller, params).await
        }
        "get_my_campaigns" => commands::campaigns::get_my_campaigns(state, caller).await,
        "get_active_campaigns" => commands::campaigns::get_active_campaigns(state, params).await,
        "preview_campaign_plan" => commands::campaigns::preview_campaign_plan(state, params),

        // Tasks
        "get_available_tasks" => commands::tasks::get_available_tasks(state, caller, params).await,
        "get_my_tasks" => commands::tasks::get_my_tasks(state, caller, params).await,
        "assign_task" => commands::tasks::assign_task(state, caller, params).await,
        "complete_task" => commands::tasks::complete_task(state, caller, params).await,
        "get_task_stats" => commands::tasks::get_task_stats(state, caller).await,

        // Gamification
        "get_progress" => commands::gamification::get_progress(state, caller).await,
        "update_streak" => commands::gamification::update_streak(state, caller).await,
        "claim_daily_reward" => commands::gamification::claim_daily_reward(state, caller).await,
        "check_achievements" => commands::gamification::check_achievements(state, caller).await,
        "get_achievements" => commands::gamification::get_achievements(state, caller).await,
        "get_leaderboard" => commands::gamification::get_leaderboard(state, params).await,

        // Fraud
        "log_fraud_event" => commands::fraud::log_fraud_event(state, caller, params).await,
        "check_user_fraud" => commands::fraud::check_user_fraud(state, caller, params).await,
        "get_fraud_analytics" => commands::fraud::get_fraud_analytics(state, params).await,
        "rate_limit_check" => commands::fraud::rate_limit_check(state, caller, params).await,

        // Moderation
        "create_report" => commands::moderation::create_report(state, caller, params).await,
        "review_report" => commands::moderation::review_report(state, caller, params).await,
        "ban_user" => commands::moderation::ban_user(state, caller, params).await,
        "unban_user" => commands::moderation::unban_user(state, params).await,
        "submit_appeal" => commands::moderation::submit_appeal(state, caller, params).await,
        "process_appeal" => commands::moderation::process_appeal(state, caller, params).await,
        "get_moderation_queue" => commands::moderation::get_moderation_queue(state, params).await,
        "moderate_content" => commands::moderation::moderate_content(state, caller, params).await,
        "check_spam" => commands::moderation::check_spam(params),
        "get_my_reports" => commands::moderation::get_my_reports(state, caller).await,
        "get_my_bans" => commands::moderation::get_my_bans(state, caller).await,
        "check_user_banned" => commands::moderation::check_user_banned(state, caller).await,
        "get_all_reports" => commands::moderation::get_all_reports(state, params).await,
        "get_all_bans" => commands::moderation::get_all_bans(state, params).await,

        // Referrals
        "process_referral" => commands::referrals::process_referral(state, caller, params).await,
        "get_referral_stats" => commands::referrals::get_referral_stats(state, caller).await,
        "generate_referral_code" => {
            commands::referrals::generate_referral_code(state, caller).await
        }
        "validate_referral_code" => {
            commands::referrals::validate_referral_code(state, params).await
        }
        "get_referral_events" => commands::referrals::get_referral_events(state, caller).await,

        // Admin
        "set_user_role" => commands::admin::set_user_role(state, caller, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => {
            debug!(method, code = err.code, error = %err.message, "RPC method failed");
            RpcResponse::error(id, err)
        }
    }
}

/// Role and ban checks that apply before any handler runs.
async fn guard(state: &Arc<DaemonState>, caller: &Caller, method: &str) -> Result<(), RpcError> {
    if requires_admin(method) && !caller.is_admin() {
        return Err(RpcError::forbidden("admin role required"));
    }
    if caller.is_admin() || allowed_while_banned(method) {
        return Ok(());
    }
    let db = state.db.lock().await;
    if let Some(ban) = subloop_moderation::active_ban(&db, &caller.user_id, crate::unix_now())? {
        return Err(RpcError::banned(&ban.id, ban.expires_at));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{caller, state};
    use subloop_types::CampaignStatus;

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::banned("b1", None);
        assert_eq!(err.code, -32010);
        assert_eq!(err.message, "USER_BANNED");

        let err = RpcError::insufficient_credits(100, 50);
        assert_eq!(err.code, -32040);

        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: RpcError = DbError::NotFound("profile x".into()).into();
        assert_eq!(err.code, -32004);

        let err: RpcError = LedgerError::InsufficientCredits {
            required: 10,
            available: 3,
        }
        .into();
        assert_eq!(err.code, -32040);
        assert_eq!(err.data, Some(json!({"required": 10, "available": 3})));

        let err: RpcError =
            TaskError::Campaign(CampaignError::Inactive(CampaignStatus::Paused)).into();
        assert_eq!(err.code, -32053);

        let err: RpcError = TaskError::RateLimited { count: 31, limit: 30 }.into();
        assert_eq!(err.code, -32060);

        let err: RpcError = CampaignError::NotOwner.into();
        assert_eq!(err.code, -32003);

        let err: RpcError = ReferralError::SelfReferral.into();
        assert_eq!(err.code, -32074);

        let err: RpcError = ModerationError::InvalidExpiry.into();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn test_rpc_response_shapes() {
        let ok = RpcResponse::success(json!(1), json!({"balance": 1000}));
        assert!(ok.result.is_some());
        assert!(ok.error.is_none());

        let err = RpcResponse::error(json!(1), RpcError::internal_error("test"));
        let encoded = serde_json::to_value(&err).expect("encode");
        assert!(encoded.get("result").is_none());
        assert_eq!(encoded["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let state = state();
        let resp = dispatch_request(&state, &caller("u1", Role::User), request("nope", json!({})))
            .await;
        assert_eq!(resp.error.expect("error").code, -32601);
    }

    #[tokio::test]
    async fn test_wrong_version_rejected() {
        let state = state();
        let mut req = request("get_profile", json!({}));
        req.jsonrpc = "1.0".to_string();
        let resp = dispatch_request(&state, &caller("u1", Role::User), req).await;
        assert_eq!(resp.error.expect("error").code, -32600);
    }

    #[tokio::test]
    async fn test_admin_methods_forbidden_for_users() {
        let state = state();
        let resp = dispatch_request(
            &state,
            &caller("u1", Role::User),
            request("audit_ledger", json!({})),
        )
        .await;
        assert_eq!(resp.error.expect("error").code, -32003);

        let resp = dispatch_request(
            &state,
            &caller("admin", Role::Admin),
            request("audit_ledger", json!({})),
        )
        .await;
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_banned_user_limited_to_reads_and_appeal() {
        let state = state();
        let ban_id = {
            let db = state.db.lock().await;
            subloop_moderation::ban_user(
                &db,
                &subloop_moderation::BanRequest {
                    user_id: "u1",
                    banned_by: "admin",
                    reason: "spam",
                    ban_type: subloop_types::BanType::Permanent,
                    expires_at: None,
                },
                crate::unix_now(),
            )
            .expect("ban")
            .id
        };
        let banned = caller("u1", Role::User);

        let resp = dispatch_request(&state, &banned, request("claim_daily_reward", json!({})))
            .await;
        let err = resp.error.expect("error");
        assert_eq!(err.code, -32010);
        assert_eq!(err.data.expect("data")["ban_id"], json!(ban_id));

        let resp = dispatch_request(&state, &banned, request("get_profile", json!({}))).await;
        assert!(resp.error.is_none());

        let resp = dispatch_request(
            &state,
            &banned,
            request(
                "submit_appeal",
                json!({"ban_id": ban_id, "appeal_text": "it was a mistake"}),
            ),
        )
        .await;
        assert!(resp.error.is_none(), "{:?}", resp.error);
    }
}
