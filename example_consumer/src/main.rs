//! Example consumer: loads a resource document and serves its views over HTTP.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! With `VIEW` set, reads that view once (using `QUERY` as the query string) and prints JSON.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use relview::{load_file, Environment, Error, RequestParams, Resource, Service};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("relview=info")),
        )
        .init();

    let resource_path = std::env::var("RESOURCE_PATH").unwrap_or_else(|_| "resource.json".into());
    let mut config = load_file(&resource_path).await?;
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        for connector in config.connectors.iter_mut().filter(|c| c.dsn.is_empty()) {
            connector.dsn = database_url.clone();
        }
    }
    let resource = Resource::init(&config, &Environment::default()).await?;
    let service = Service::new(Arc::new(resource));

    if let Ok(view) = std::env::var("VIEW") {
        let query = std::env::var("QUERY").unwrap_or_default();
        let json = service
            .read_json(&view, RequestParams::from_query_string(&query))
            .await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let app = Router::new()
        .route("/views/:view", get(read_view))
        .with_state(service);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn read_view(
    State(service): State<Service>,
    Path(view): Path<String>,
    request: RequestParams,
) -> Response {
    match service.read(&view, request).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            let status = match &err {
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Bind(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(view = %view, error = %err, "read failed");
            (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
        }
    }
}
