//! Referral command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_db::queries::profiles;
use subloop_types::events::{Event, EventType};
use subloop_types::TransactionType;

use super::profile::emit_credits_changed;
use super::{required_str, to_json, Result};
use crate::rpc::Caller;
use crate::{unix_now, DaemonState};

/// Redeem a referral code for the caller.
pub async fn process_referral(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let code = required_str(params, "referral_code")?;

    let (outcome, referrer_balance) = {
        let mut db = state.db.lock().await;
        let outcome =
            subloop_referral::process_referral(&mut db, code, &caller.user_id, unix_now())?;
        let balance = profiles::credits(&db, &outcome.referrer.id)?;
        (outcome, balance)
    };

    let now = unix_now();
    for party in [&outcome.referrer, &outcome.referee] {
        state.event_bus.emit(Event::for_user(
            EventType::ReferralProcessed,
            party.id.as_str(),
            now,
            json!({
                "referrer_id": outcome.referrer.id,
                "referee_id": outcome.referee.id,
                "bonus_awarded": party.bonus_awarded,
            }),
        ));
    }
    emit_credits_changed(
        state,
        &outcome.referrer.id,
        referrer_balance,
        TransactionType::ReferralBonus,
    );
    emit_credits_changed(
        state,
        &outcome.referee.id,
        outcome.referee_balance,
        TransactionType::ReferralBonus,
    );
    to_json(&outcome)
}

pub async fn get_referral_stats(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&subloop_referral::stats(&db, &caller.user_id, unix_now())?)
}

/// Replace the caller's referral code with a fresh one.
pub async fn generate_referral_code(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    let code =
        subloop_referral::assign_code(&db, &caller.user_id, &mut rand::thread_rng(), unix_now())?;
    Ok(json!({ "referral_code": code }))
}

pub async fn validate_referral_code(state: &Arc<DaemonState>, params: &Value) -> Result {
    let code = required_str(params, "referral_code")?;
    let db = state.db.lock().await;
    to_json(&subloop_referral::validate_code(&db, code)?)
}

pub async fn get_referral_events(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&subloop_referral::events(&db, &caller.user_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{caller, state};
    use subloop_types::Role;

    #[tokio::test]
    async fn test_referral_flow() {
        let state = state();
        let alice = caller("u1", Role::User);
        let bob = caller("u2", Role::User);

        let code = generate_referral_code(&state, &alice).await.expect("code");
        let code = code["referral_code"].as_str().expect("code").to_string();

        let validation = validate_referral_code(
            &state,
            &json!({"referral_code": code.to_lowercase()}),
        )
        .await
        .expect("validate");
        assert_eq!(validation["valid"], true);
        assert_eq!(validation["referrer"]["id"], "u1");

        let mut events = state.event_bus.subscribe();
        let outcome = process_referral(&state, &bob, &json!({"referral_code": code}))
            .await
            .expect("refer");
        assert_eq!(outcome["total_bonus_awarded"], 150);
        assert_eq!(outcome["referee_balance"], 50);

        let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert!(received
            .iter()
            .any(|e| e.event_type == EventType::ReferralProcessed && e.visible_to("u1")));
        assert!(received
            .iter()
            .any(|e| e.event_type == EventType::ReferralProcessed && e.visible_to("u2")));

        let err = process_referral(&state, &bob, &json!({"referral_code": code}))
            .await
            .expect_err("twice");
        assert_eq!(err.code, -32075);

        let stats = get_referral_stats(&state, &alice).await.expect("stats");
        assert_eq!(stats["total_referrals"], 1);
        assert_eq!(stats["total_earnings"], 100);

        let log = get_referral_events(&state, &bob).await.expect("events");
        assert_eq!(log.as_array().expect("array").len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_and_self_referral() {
        let state = state();
        let alice = caller("u1", Role::User);

        let err = process_referral(&state, &alice, &json!({"referral_code": "NOPE0000"}))
            .await
            .expect_err("unknown");
        assert_eq!(err.code, -32073);

        let validation = validate_referral_code(&state, &json!({"referral_code": "NOPE0000"}))
            .await
            .expect("validate");
        assert_eq!(validation["valid"], false);

        let code = generate_referral_code(&state, &alice).await.expect("code");
        let err = process_referral(&state, &alice, &json!({"referral_code": code["referral_code"]}))
            .await
            .expect_err("self");
        assert_eq!(err.code, -32074);
    }
}
