//! API Handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use vibedoc_entitlements::{EntitlementEngine, EntitlementError, ProStatus, SessionInfo};
use vibedoc_payments::{PayPalOrder, PaymentError};

use crate::{auth, models::*, AppState};

fn pro_plan_price_usd() -> Decimal {
    dec!(9.99)
}

fn pro_plan_price_inr() -> Decimal {
    dec!(499)
}

// Sessions

pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user_id = state.account_id(&email);
    let token =
        auth::create_token(user_id, &email).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(SessionResponse { token, user_id }))
}

// Pro status & consume (server-authoritative)

pub async fn pro_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProStatus>, StatusCode> {
    let session = auth::require_session(&headers)?;
    // Status reads fail closed inside the service
    Ok(Json(state.subscriptions.status(session.user_id)))
}

pub async fn pro_consume(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConsumeResponse>, StatusCode> {
    let session = auth::require_session(&headers)?;
    let remaining_today = state
        .subscriptions
        .consume(session.user_id)
        .map_err(|e| entitlement_status(e.into()))?;
    Ok(Json(ConsumeResponse { remaining_today }))
}

// Payments

pub async fn paypal_create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PayPalOrder>, StatusCode> {
    let session = auth::require_session(&headers)?;
    let order = state
        .paypal
        .create_order(session.user_id, pro_plan_price_usd(), "USD");
    Ok(Json(order))
}

pub async fn paypal_capture(
    State(state): State<AppState>,
    Json(req): Json<CaptureRequest>,
) -> Result<Json<ProStatus>, StatusCode> {
    let confirmation = state
        .paypal
        .capture_order(req.order_id)
        .map_err(payment_status)?;
    state
        .activation
        .activate(&confirmation)
        .map_err(payment_status)?;
    Ok(Json(state.subscriptions.status(confirmation.user_id)))
}

pub async fn upi_create_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UpiIntentResponse>, StatusCode> {
    let session = auth::require_session(&headers)?;
    let intent = state.upi.create_intent(session.user_id, pro_plan_price_inr());
    Ok(Json(UpiIntentResponse {
        reference: intent.reference,
        link: intent.link,
        amount: intent.amount,
    }))
}

pub async fn upi_confirm(
    State(state): State<AppState>,
    Json(req): Json<UpiConfirmRequest>,
) -> Result<Json<ProStatus>, StatusCode> {
    let confirmation = state.upi.confirm(&req.reference).map_err(payment_status)?;
    state
        .activation
        .activate(&confirmation)
        .map_err(payment_status)?;
    Ok(Json(state.subscriptions.status(confirmation.user_id)))
}

// Generation & rewrite
//
// Authorize/deny is resolved here before the generator runs; a denial
// blocks the call and consumes nothing.

pub async fn generate_readme(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, StatusCode> {
    let (engine, device_id, session) = caller(&state, &headers);
    let remaining = authorize_one(&engine, session.as_ref())?;
    let readme = state.generator.generate(&req.repo_url, req.vibe);
    Ok(Json(GenerateResponse {
        readme,
        remaining,
        device_id,
    }))
}

pub async fn rewrite_readme(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<GenerateResponse>, StatusCode> {
    let (engine, device_id, session) = caller(&state, &headers);
    let remaining = authorize_one(&engine, session.as_ref())?;
    let readme = state.generator.rewrite(&req.readme, req.vibe);
    Ok(Json(GenerateResponse {
        readme,
        remaining,
        device_id,
    }))
}

fn caller(
    state: &AppState,
    headers: &HeaderMap,
) -> (Arc<EntitlementEngine>, String, Option<SessionInfo>) {
    let presented = headers
        .get("x-device-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    let (engine, device_id) = match presented {
        Some(id) => (state.engines.engine_for(id), id.to_string()),
        // No id presented: mint one and hand back an unretained engine.
        // The client persists the returned id and presents it next time.
        None => (state.engines.fresh_engine(), Uuid::new_v4().to_string()),
    };
    let session = auth::session_from_headers(headers);
    if let Some(s) = &session {
        engine.on_login(s);
    }
    (engine, device_id, session)
}

fn authorize_one(
    engine: &EntitlementEngine,
    session: Option<&SessionInfo>,
) -> Result<u32, StatusCode> {
    if engine.remaining_allowance(session) == 0 {
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }
    engine
        .consume_one(session)
        .map_err(entitlement_status)
}

fn entitlement_status(err: EntitlementError) -> StatusCode {
    match err {
        EntitlementError::QuotaExceeded | EntitlementError::DailyLimitReached => {
            StatusCode::TOO_MANY_REQUESTS
        }
        EntitlementError::NotPro => StatusCode::FORBIDDEN,
        EntitlementError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn payment_status(err: PaymentError) -> StatusCode {
    match err {
        PaymentError::OrderNotFound | PaymentError::UnknownReference => StatusCode::NOT_FOUND,
        PaymentError::InvalidState => StatusCode::CONFLICT,
        PaymentError::NotConfirmed => StatusCode::PAYMENT_REQUIRED,
        PaymentError::Activation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibedoc_entitlements::{
        CounterStore, EntitlementLimits, MemoryStorage, MemorySubscriptionStore,
        SubscriptionService, SystemClock,
    };

    fn engine() -> EntitlementEngine {
        let limits = EntitlementLimits::default();
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(MemorySubscriptionStore::new()),
            Arc::new(SystemClock),
            limits,
        ));
        EntitlementEngine::new(
            CounterStore::new(Arc::new(MemoryStorage::new()), limits),
            subscriptions,
            limits,
        )
    }

    #[test]
    fn test_entitlement_errors_map_to_status_codes() {
        assert_eq!(
            entitlement_status(EntitlementError::QuotaExceeded),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            entitlement_status(EntitlementError::DailyLimitReached),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            entitlement_status(EntitlementError::NotPro),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            entitlement_status(EntitlementError::Storage("backend down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_payment_errors_map_to_status_codes() {
        assert_eq!(
            payment_status(PaymentError::OrderNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            payment_status(PaymentError::UnknownReference),
            StatusCode::NOT_FOUND
        );
        assert_eq!(payment_status(PaymentError::InvalidState), StatusCode::CONFLICT);
        assert_eq!(
            payment_status(PaymentError::NotConfirmed),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            payment_status(PaymentError::Activation("upsert failed".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_denied_request_consumes_nothing() {
        let engine = engine();
        for _ in 0..3 {
            authorize_one(&engine, None).unwrap();
        }

        assert_eq!(
            authorize_one(&engine, None),
            Err(StatusCode::TOO_MANY_REQUESTS)
        );
        assert_eq!(engine.counters().anonymous_usage(), 3);
    }
}
