use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use gateway::GameContext;
use reconcile::Reconciler;
use serde::Deserialize;
use shared::{domain::MoveSource, error::ApiError, protocol::ServerEvent};
use tracing::{info, warn};
use transport::TcpBoardTransport;

mod config;

use config::load_settings;

#[derive(Clone)]
struct AppState {
    game: GameContext,
}

#[derive(Debug, Deserialize)]
struct SubmitMoveRequest {
    #[serde(rename = "move")]
    move_text: String,
    #[serde(default)]
    source: Option<MoveSource>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();

    // The bridge connection is lazy, so starting without the physical board
    // attached is fine; the loop just logs skipped cycles until it appears.
    let transport = Arc::new(TcpBoardTransport::new(settings.bridge_addr.clone()));
    let game = GameContext::with_actuator(transport.clone(), settings.actuator_timeout());
    tokio::spawn(Reconciler::new(game.clone(), transport, settings.reconciler_config()).run());

    let state = AppState { game };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/board", get(http_board))
        .route("/move", post(http_move))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_board(State(state): State<Arc<AppState>>) -> Json<ServerEvent> {
    Json(state.game.board_view().await)
}

async fn http_move(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitMoveRequest>,
) -> Result<Json<ServerEvent>, (StatusCode, Json<ApiError>)> {
    let source = req.source.unwrap_or(MoveSource::Ui);
    let event = state
        .game
        .submit_text(req.move_text.trim(), source)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(e)))?;
    Ok(Json(event))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.game.subscribe_events();

    // New viewers get the current board before the live stream starts.
    let attach = state.game.board_view().await;
    match serde_json::to_string(&attach) {
        Ok(text) => {
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        Err(error) => {
            warn!(%error, "failed to serialize attach view");
            return;
        }
    }

    let send_task = tokio::spawn(async move {
        while let Ok(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // The physical-channel test client pushes moves as JSON text frames.
    while let Some(Ok(message)) = receiver.next().await {
        if let Message::Text(text) = message {
            match serde_json::from_str::<SubmitMoveRequest>(&text) {
                Ok(req) => {
                    let source = req.source.unwrap_or(MoveSource::Physical);
                    // Rejections already fan out on the event stream.
                    let _ = state.game.submit_text(req.move_text.trim(), source).await;
                }
                Err(error) => warn!(%error, "ignoring malformed ws frame"),
            }
        }
    }

    send_task.abort();
}
