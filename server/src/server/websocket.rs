use crate::config::{WsConfig, default_workers};
use crate::error::SegmentError;
use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::session::{Session, SessionConfig, SessionManager};
use crate::solver::{GrabCutSolver, SolverPool};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub solver: SolverPool,
    pub session_config: SessionConfig,
    pub ws: Arc<WsConfig>,
    started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(SessionManager::new()),
            solver: SolverPool::new(Arc::new(GrabCutSolver::default()), default_workers()),
            session_config: SessionConfig::default(),
            ws: Arc::new(WsConfig::default()),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn with_session_manager(mut self, sessions: Arc<SessionManager>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_solver(mut self, solver: SolverPool) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn with_ws_config(mut self, ws: WsConfig) -> Self {
        self.ws = Arc::new(ws);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.ws.max_message_size)
        .on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
///
/// Frames are processed one at a time in arrival order, so results go out in
/// the same order as the events that produced them.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut session = Session::new(Uuid::new_v4(), state.session_config);
    let session_id = session.id();
    info!("New WebSocket connection: {}", session_id);

    state.sessions.register(&session).await;

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Spawn task to forward outgoing messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.to_frame() {
                Ok(frame) => {
                    counter!("segment_messages_sent_total", "type" => msg.message_type())
                        .increment(1);
                    if ws_sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                error!("WebSocket error for {}: {}", session_id, e);
                break;
            }
        };

        let outcome = match msg {
            Message::Text(text) => handle_text(&mut session, &text, &state).await,
            Message::Binary(_) => Err(ProtocolError::BinaryFrame.into()),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                info!("Client {} requested close", session_id);
                break;
            }
        };

        counter!("segment_frames_total").increment(1);
        state.sessions.record_frame(&session).await;

        let responses = match outcome {
            Ok(responses) => responses,
            Err(e) => {
                let code = e.code();
                warn!("Rejected frame from {}: {} ({})", session_id, e, code.as_str());
                counter!("segment_errors_total", "code" => code.as_str()).increment(1);
                vec![e.to_message()]
            }
        };

        let mut closed = false;
        for response in responses {
            if tx.send(response).await.is_err() {
                closed = true;
                break;
            }
        }
        if closed {
            debug!("Send channel closed for {}", session_id);
            break;
        }
    }

    // Cleanup
    drop(tx);
    if let Err(e) = send_task.await {
        error!("Send task for {} failed: {}", session_id, e);
    }

    state.sessions.remove(session_id).await;
    info!("WebSocket connection closed: {}", session_id);
}

/// Parse and apply one text frame
async fn handle_text(
    session: &mut Session,
    text: &str,
    state: &AppState,
) -> Result<Vec<ServerMessage>, SegmentError> {
    let message = ClientMessage::parse(text)?;
    debug!(
        "Session {} received events {:?}",
        session.id(),
        message.event_names()
    );
    session.handle_message(message, &state.solver).await
}
