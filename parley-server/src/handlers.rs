use axum::{
    extract::{Query, State},
    Json,
};
use tracing::{debug, error, info};

use crate::extract::{extract_reply, Reply};
use crate::state::{AppState, ChatRequest, HistoryResponse, MessageResponse, SessionQuery};

pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello from the parley chat relay!".to_string(),
    })
}

/// Run one user/assistant exchange. Always answers 200; failures are
/// reported as assistant content.
///
/// The exchange runs on its own task so a caller that disconnects mid-way
/// cannot leave a user turn without its reply.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Json<Reply> {
    let session_id = state
        .settings
        .resolve_session(payload.session_id.as_deref());
    info!(session_id = %session_id, "Received user message: {}", payload.user_message);

    let exchange = tokio::spawn(run_exchange(state, session_id, payload.user_message));
    match exchange.await {
        Ok(reply) => Json(reply),
        Err(e) => {
            error!("Chat exchange task failed: {}", e);
            Json(Reply::assistant(format!("Error: {}", e)))
        }
    }
}

async fn run_exchange(state: AppState, session_id: String, user_message: String) -> Reply {
    let lock = state.store.exchange_lock(&session_id);
    let _exchange = lock.lock().await;

    state.store.append(&session_id, "user", user_message);
    let history = state.store.get(&session_id);
    debug!(session_id = %session_id, "Sending {} turn(s) to the provider", history.len());

    let result = state
        .provider
        .complete(&history, state.settings.instructions.as_deref())
        .await;
    if let Ok(response) = &result {
        debug!(session_id = %session_id, "Raw completion response: {}", response);
    }

    let reply = extract_reply(&result, &state.settings.extraction);
    state
        .store
        .append(&session_id, reply.role.as_str(), reply.content.as_str());

    info!(session_id = %session_id, role = %reply.role, "Sending reply: {}", reply.content);
    reply
}

pub async fn clear_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<MessageResponse> {
    let session_id = state.settings.resolve_session(query.session_id.as_deref());

    let lock = state.store.exchange_lock(&session_id);
    let _exchange = lock.lock().await;
    state.store.clear(&session_id);

    info!(session_id = %session_id, "Chat history cleared");
    Json(MessageResponse {
        message: format!("Chat history for session '{}' cleared.", session_id),
    })
}

pub async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<HistoryResponse> {
    let session_id = state.settings.resolve_session(query.session_id.as_deref());
    let response = match state.store.session(&session_id) {
        Some(session) => HistoryResponse {
            session_id,
            turns: session.turns,
            updated_at: Some(session.updated_at),
        },
        None => HistoryResponse {
            session_id,
            turns: Vec::new(),
            updated_at: None,
        },
    };
    Json(response)
}
