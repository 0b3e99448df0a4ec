//! Vibedoc API Backend
//!
//! Rust/Axum backend for the README generator: session issuance,
//! server-authoritative Pro status and consume, payment activation, and
//! the generation endpoints gated by the entitlement engine.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use parking_lot::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use vibedoc_entitlements::{
    CounterStore, EntitlementEngine, EntitlementLimits, MemoryStorage, MemorySubscriptionStore,
    SubscriptionService, SystemClock,
};
use vibedoc_payments::{ActivationGateway, PayPalGateway, UpiConfig, UpiGateway};

mod auth;
mod generate;
mod handlers;
mod models;

use generate::{ReadmeGenerator, TemplateGenerator};
use handlers::*;

/// Per-device entitlement engines sharing one subscription service.
///
/// Each client device gets its own engine over its own counter storage,
/// keyed by the opaque device id the client presents.
pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Arc<EntitlementEngine>>>,
    subscriptions: Arc<SubscriptionService>,
    limits: EntitlementLimits,
}

impl EngineRegistry {
    fn new(subscriptions: Arc<SubscriptionService>, limits: EntitlementLimits) -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            subscriptions,
            limits,
        }
    }

    /// Engine for a client-presented device id, created and retained on
    /// first sight
    pub fn engine_for(&self, device_id: &str) -> Arc<EntitlementEngine> {
        if let Some(engine) = self.engines.read().get(device_id) {
            return engine.clone();
        }
        self.engines
            .write()
            .entry(device_id.to_string())
            .or_insert_with(|| self.build_engine())
            .clone()
    }

    /// Engine that is not retained in the registry.
    ///
    /// Used when the caller presented no device id: the server mints one
    /// and returns it, but only ids the client actually persists and
    /// presents again earn a registry slot. The map therefore grows with
    /// returning devices, not with request volume.
    pub fn fresh_engine(&self) -> Arc<EntitlementEngine> {
        self.build_engine()
    }

    fn build_engine(&self) -> Arc<EntitlementEngine> {
        Arc::new(EntitlementEngine::new(
            CounterStore::new(Arc::new(MemoryStorage::new()), self.limits),
            self.subscriptions.clone(),
            self.limits,
        ))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engines: Arc<EngineRegistry>,
    pub subscriptions: Arc<SubscriptionService>,
    pub activation: Arc<ActivationGateway>,
    pub paypal: Arc<PayPalGateway>,
    pub upi: Arc<UpiGateway>,
    pub generator: Arc<dyn ReadmeGenerator>,
    accounts: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl AppState {
    fn new() -> Self {
        let limits = EntitlementLimits::default();
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(MemorySubscriptionStore::new()),
            Arc::new(SystemClock),
            limits,
        ));

        Self {
            engines: Arc::new(EngineRegistry::new(subscriptions.clone(), limits)),
            activation: Arc::new(ActivationGateway::new(subscriptions.clone())),
            subscriptions,
            paypal: Arc::new(PayPalGateway::new()),
            upi: Arc::new(UpiGateway::new(UpiConfig {
                payee_vpa: "vibedoc@upi".into(),
                payee_name: "Vibedoc Pro".into(),
            })),
            generator: Arc::new(TemplateGenerator),
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Durable user id for an email, minted on first sight
    pub fn account_id(&self, email: &str) -> Uuid {
        if let Some(id) = self.accounts.read().get(email) {
            return *id;
        }
        *self
            .accounts
            .write()
            .entry(email.to_string())
            .or_insert_with(Uuid::new_v4)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState::new();

    let app = Router::new()
        // Health check
        .route("/health", get(health))
        // Sessions
        .route("/api/auth/session", post(create_session))
        // Pro status & consume
        .route("/api/pro/status", get(pro_status))
        .route("/api/pro/consume", post(pro_consume))
        // Payments
        .route("/api/payments/paypal/order", post(paypal_create_order))
        .route("/api/payments/paypal/capture", post(paypal_capture))
        .route("/api/payments/upi/intent", post(upi_create_intent))
        .route("/api/payments/upi/confirm", post(upi_confirm))
        // Generation
        .route("/api/generate", post(generate_readme))
        .route("/api/rewrite", post(rewrite_readme))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = "0.0.0.0:8080";
    tracing::info!("Vibedoc API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EngineRegistry {
        let limits = EntitlementLimits::default();
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(MemorySubscriptionStore::new()),
            Arc::new(SystemClock),
            limits,
        ));
        EngineRegistry::new(subscriptions, limits)
    }

    #[test]
    fn test_engine_for_retains_one_engine_per_device() {
        let registry = registry();

        let first = registry.engine_for("dev-1");
        let second = registry.engine_for("dev-1");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.engines.read().len(), 1);
    }

    #[test]
    fn test_fresh_engines_do_not_grow_the_registry() {
        let registry = registry();

        for _ in 0..16 {
            let _ = registry.fresh_engine();
        }

        assert_eq!(registry.engines.read().len(), 0);
    }
}
