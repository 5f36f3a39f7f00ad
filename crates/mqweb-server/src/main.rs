//! mqweb Server - HTTP front end for the broker console
//!
//! This is the main entry point for mqweb.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
#[cfg(feature = "stomp")]
use mqweb_client::StompClient;
use mqweb_client::{MemoryBroker, RoutingClient};
use mqweb_core::{ConnectionCatalog, Console, SendRequest};
use mqweb_types::{Error, Message, MessageHeaders};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

mod config;

use config::ServerConfig;

// ==================== App State ====================

/// Shared application state
#[derive(Clone)]
struct AppState {
    console: Arc<Console>,
}

// ==================== Request/Response Types ====================

/// Connect request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    /// Broker address, e.g. "tcp://localhost:61616"
    broker_url: String,
    /// Broker username
    user_name: String,
    /// Broker password
    password: String,
}

/// Connection status
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct ConnectionResponse {
    /// Address of the connected broker
    broker_url: Option<String>,
    /// Whether a connection is active
    connected: bool,
}

impl ConnectionResponse {
    fn connected(broker_url: String) -> Self {
        Self {
            broker_url: Some(broker_url),
            connected: true,
        }
    }

    fn not_connected() -> Self {
        Self {
            broker_url: None,
            connected: false,
        }
    }
}

/// Send message request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    /// Message body
    body: String,
    /// String properties
    #[serde(default)]
    properties: HashMap<String, String>,
    /// Destination; prefix with "topic://" to publish to a topic
    destination: String,
    /// Correlation id
    #[serde(default)]
    correlation_id: Option<String>,
    /// Reply-to destination
    #[serde(default)]
    reply_to: Option<String>,
}

impl From<SendMessageRequest> for SendRequest {
    fn from(req: SendMessageRequest) -> Self {
        SendRequest {
            body: req.body,
            properties: req.properties,
            destination: req.destination,
            correlation_id: req.correlation_id,
            reply_to: req.reply_to,
        }
    }
}

/// Queue name query parameter
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueQuery {
    queue_name: String,
}

/// Connection name query parameter
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionQuery {
    connection_name: String,
}

/// API Error response
#[derive(Debug, Serialize, ToSchema)]
struct ApiErrorBody {
    /// Error message
    error: String,
    /// Error code
    code: String,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    /// Health status
    status: String,
    /// Server version
    version: String,
}

// ==================== Error Handling ====================

/// Wrapper for console errors to implement IntoResponse
struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self.0 {
            Error::NotConnected => (StatusCode::NOT_FOUND, "NOT_CONNECTED"),
            Error::ConnectionProfileNotFound(_) => {
                (StatusCode::NOT_FOUND, "CONNECTION_PROFILE_NOT_FOUND")
            }
            Error::InvalidDestination(_) => (StatusCode::BAD_REQUEST, "INVALID_DESTINATION"),
            Error::BrokerOperationFailed { .. } => (StatusCode::BAD_GATEWAY, "BROKER_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        };

        error!(code = code, error = %self.0, "Request failed");

        let body = Json(ApiErrorBody {
            error: self.0.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

// ==================== OpenAPI Documentation ====================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mqweb API",
        version = "0.1.0",
        description = "mqweb - browse and publish to a message broker",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health,
        list_queues,
        create_queue,
        browse_messages,
        send_message,
        connect,
        connect_by_name,
        disconnect,
        connection_status,
        list_connections,
    ),
    components(
        schemas(
            HealthResponse,
            ConnectRequest,
            ConnectionResponse,
            SendMessageRequest,
            Message,
            MessageHeaders,
            ApiErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "connection", description = "Broker connection endpoints"),
        (name = "queues", description = "Queue endpoints"),
        (name = "messages", description = "Message endpoints")
    )
)]
struct ApiDoc;

// ==================== Handlers ====================

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List all queue names
#[utoipa::path(
    get,
    path = "/api/queue",
    tag = "queues",
    responses(
        (status = 200, description = "Queue names", body = Vec<String>),
        (status = 404, description = "Not connected", body = ApiErrorBody)
    )
)]
async fn list_queues(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let queues = state.console.list_queues().await?;
    Ok(Json(queues))
}

/// Create a queue
#[utoipa::path(
    post,
    path = "/api/queue",
    tag = "queues",
    params(
        ("queueName" = String, Query, description = "Queue name")
    ),
    responses(
        (status = 200, description = "Queue created"),
        (status = 404, description = "Not connected", body = ApiErrorBody)
    )
)]
async fn create_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> Result<StatusCode, AppError> {
    state.console.create_queue(&query.queue_name).await?;
    Ok(StatusCode::OK)
}

/// Browse the messages on a queue without removing them
#[utoipa::path(
    get,
    path = "/api/message",
    tag = "messages",
    params(
        ("queueName" = String, Query, description = "Queue name")
    ),
    responses(
        (status = 200, description = "Messages on the queue", body = Vec<Message>),
        (status = 404, description = "Not connected", body = ApiErrorBody)
    )
)]
async fn browse_messages(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state.console.browse_messages(&query.queue_name).await?;
    Ok(Json(messages))
}

/// Send a message to a queue or topic
#[utoipa::path(
    post,
    path = "/api/send",
    tag = "messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = Message),
        (status = 400, description = "Invalid destination", body = ApiErrorBody),
        (status = 404, description = "Not connected", body = ApiErrorBody)
    )
)]
async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let message = state.console.send(req.into()).await?;
    Ok(Json(message))
}

/// Connect to a broker
#[utoipa::path(
    post,
    path = "/api/connect",
    tag = "connection",
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "Connected", body = ConnectionResponse),
        (status = 502, description = "Broker rejected the connection", body = ApiErrorBody)
    )
)]
async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectionResponse>, AppError> {
    state
        .console
        .connect(&req.broker_url, &req.user_name, &req.password)
        .await?;
    Ok(Json(ConnectionResponse::connected(req.broker_url)))
}

/// Connect using a configured connection profile
#[utoipa::path(
    get,
    path = "/api/connect",
    tag = "connection",
    params(
        ("connectionName" = String, Query, description = "Connection profile name")
    ),
    responses(
        (status = 200, description = "Connected", body = ConnectionResponse),
        (status = 404, description = "Unknown connection profile", body = ApiErrorBody)
    )
)]
async fn connect_by_name(
    State(state): State<AppState>,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let broker_url = state.console.connect_by_name(&query.connection_name).await?;
    Ok(Json(ConnectionResponse::connected(broker_url)))
}

/// Disconnect from the broker
#[utoipa::path(
    delete,
    path = "/api/connection",
    tag = "connection",
    responses(
        (status = 204, description = "Disconnected")
    )
)]
async fn disconnect(State(state): State<AppState>) -> StatusCode {
    state.console.disconnect().await;
    StatusCode::NO_CONTENT
}

/// Current connection status
#[utoipa::path(
    get,
    path = "/api/connected",
    tag = "connection",
    responses(
        (status = 200, description = "Connection status", body = ConnectionResponse)
    )
)]
async fn connection_status(State(state): State<AppState>) -> Json<ConnectionResponse> {
    match state.console.current_broker_address() {
        Ok(broker_url) => Json(ConnectionResponse::connected(broker_url)),
        Err(_) => Json(ConnectionResponse::not_connected()),
    }
}

/// Names of the configured connection profiles
#[utoipa::path(
    get,
    path = "/api/connection",
    tag = "connection",
    responses(
        (status = 200, description = "Connection profile names", body = Vec<String>)
    )
)]
async fn list_connections(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.console.list_connection_names())
}

// ==================== Router ====================

fn create_router(state: AppState) -> Router {
    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health
        .route("/health", get(health))
        // Queues
        .route("/api/queue", get(list_queues).post(create_queue))
        // Messages
        .route("/api/message", get(browse_messages))
        .route("/api/send", post(send_message))
        // Connection
        .route("/api/connect", post(connect).get(connect_by_name))
        .route("/api/connected", get(connection_status))
        .route("/api/connection", get(list_connections).delete(disconnect))
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Broker Clients ====================

/// Broker clients keyed by address scheme
///
/// `memory://<name>` addresses get an in-process broker per name. With the
/// `stomp` feature, `stomp://` and `tcp://` addresses reach a real broker's
/// STOMP connector.
fn broker_client() -> RoutingClient {
    let client = RoutingClient::new().route("memory", MemoryBroker::new());

    #[cfg(feature = "stomp")]
    let client = {
        let stomp = Arc::new(StompClient::new());
        client
            .route_shared("stomp", stomp.clone())
            .route_shared("tcp", stomp)
    };

    client
}

// ==================== Main ====================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mqweb=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_config = ServerConfig::parse();
    server_config.log_config();

    // Load named connection profiles
    let catalog = ConnectionCatalog::load(&server_config.config)?;

    // Create console over the scheme-routed broker clients
    let client = broker_client();
    info!(schemes = ?client.schemes(), "Broker clients registered");
    let console = Arc::new(Console::new(client, catalog));

    // Create app state
    let state = AppState { console };

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&server_config.bind).await?;

    info!("mqweb server listening on {}", server_config.bind);
    info!("Swagger UI: http://{}/swagger-ui/", server_config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
