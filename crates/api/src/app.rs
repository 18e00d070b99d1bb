use std::time::Duration;

use async_graphql::dynamic::Schema;
use async_graphql_axum::{GraphQLProtocol, GraphQLWebSocket};
use axum::{
    extract::{Request, State, WebSocketUpgrade},
    http::{
        header::{HeaderValue, CONTENT_TYPE},
        Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the Axum router with health endpoint and GraphQL over HTTP and WebSocket.
pub fn build_router(state: AppState, schema: Schema, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    Router::new()
        // Liveness; also proves DB connectivity when backed by Postgres.
        .route("/health", get(health))
        .route(
            "/graphql",
            get({
                let schema = schema.clone();
                move |protocol, upgrade| graphql_ws_handler(protocol, upgrade, schema)
            })
            .post(move |req| graphql_handler(req, schema)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE]),
        )
}

async fn graphql_handler(req: Request, schema: Schema) -> Result<Response, AppError> {
    let (_parts, body) = req.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read request body: {}", e)))?;

    let gql_request: async_graphql::Request = serde_json::from_slice(&body_bytes)
        .map_err(|e| AppError::BadRequest(format!("Invalid GraphQL request: {}", e)))?;

    let gql_response = schema.execute(gql_request).await;

    Ok(Json(gql_response).into_response())
}

/// WebSocket endpoint for subscriptions (`graphql-transport-ws` and `graphql-ws`).
async fn graphql_ws_handler(protocol: GraphQLProtocol, upgrade: WebSocketUpgrade, schema: Schema) -> Response {
    upgrade
        .protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |stream| GraphQLWebSocket::new(stream, schema, protocol).serve())
}

async fn health(State(state): State<AppState>) -> Result<&'static str, AppError> {
    if let Some(pool) = &state.db {
        let _one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    }
    Ok("ok")
}
