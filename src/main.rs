//! SafeCircle realtime server: circle presence rooms, live location fanout,
//! SOS alert broadcast and the journey watchdog.

mod broadcast;
mod config;
mod error;
mod geo;
mod handlers;
mod http;
mod model;
mod pipeline;
mod protocol;
mod push;
mod registry;
mod state;
mod store;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use futures::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use push::LogPushSink;
use state::AppState;
use std::sync::Arc;
use store::InMemoryStore;
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Collaborators are injected here; swap in database and FCM adapters to
    // go beyond the in-memory development setup.
    let store = Arc::new(InMemoryStore::new());
    let push = Arc::new(LogPushSink);
    let state = Arc::new(AppState::new(config.clone(), store, push));

    // Internal watchdog timer. The external scheduler endpoint stays
    // available either way; the sweep's single-flight guard keeps the two
    // from overlapping.
    if config.watchdog.interval_secs > 0 {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let period = tokio::time::Duration::from_secs(sweep_state.config.watchdog.interval_secs);
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately, skip it
            loop {
                interval.tick().await;
                if let Err(error) = sweep_state.watchdog.sweep().await {
                    tracing::error!(error = %error, "watchdog sweep failed");
                }
            }
        });
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .merge(http::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("🚀 SafeCircle Realtime Server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app)
        .await
        .expect("server error");
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>SafeCircle Realtime Server</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "safecircle-realtime-rs",
        "connections": state.registry.connection_count(),
        "rooms": state.registry.room_count(),
        "timestamp": chrono::Utc::now(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = handlers::handle_connection(&state, tx.clone());

    // Send task: one writer per socket, fed by the registry's unbounded
    // channel so broadcasts never block on a slow client.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &connection_id, &tx, msg),
                Err(error) => {
                    let _ = tx.send(ServerMessage::Error {
                        code: "bad_message".to_string(),
                        message: error.to_string(),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    handlers::handle_disconnect(&state, &connection_id);
    send_task.abort();
}

fn handle_client_message(
    state: &Arc<AppState>,
    connection_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
        }
        ClientMessage::Identify { user_id } => {
            handlers::handle_identify(state, connection_id, &user_id);
        }
        ClientMessage::JoinCircle { circle_id } => {
            handlers::handle_join_circle(state, connection_id, sender, &circle_id);
        }
        ClientMessage::LeaveCircle { circle_id } => {
            handlers::handle_leave_circle(state, connection_id, &circle_id);
        }
    }
}
