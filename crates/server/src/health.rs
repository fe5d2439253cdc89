use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use saiborg_index::store::VectorStore;

#[derive(Clone)]
pub struct HealthState {
    store: VectorStore,
    crm_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub index: HealthCheck,
    pub crm: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: VectorStore, crm_enabled: bool) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { store, crm_enabled })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    store: VectorStore,
    crm_enabled: bool,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(store, crm_enabled)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let index = index_check(&state.store).await;
    let ready = index.status == "ready";

    let crm = if state.crm_enabled {
        HealthCheck { status: "ready", detail: "crm client configured".to_string() }
    } else {
        HealthCheck { status: "disabled", detail: "no crm api key configured".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "saiborg-server runtime initialized".to_string(),
        },
        index,
        crm,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn index_check(store: &VectorStore) -> HealthCheck {
    match store.count().await {
        Ok(count) => HealthCheck {
            status: "ready",
            detail: format!("vector store reachable with {count} chunks"),
        },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("vector store query failed: {error}"),
        },
    }
}
