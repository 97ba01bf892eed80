//! Account endpoints.

use api_types::user::{TelegramLink, UserView};
use axum::{Extension, Json, extract::State};
use engine::{EngineError, User};

use crate::{ServerError, server::ServerState};

pub(crate) fn user_view(user: User) -> UserView {
    UserView {
        id: user.id,
        name: user.name,
        email: user.email,
        telegram_id: user.telegram_id,
        created_at: user.created_at,
    }
}

/// The acting account.
pub async fn me(Extension(user): Extension<User>) -> Json<UserView> {
    Json(user_view(user))
}

/// Links a chat identity to the account registered with the given email.
///
/// Called by the chat bot's service account once a pending login receives an
/// email address.
pub async fn link_telegram(
    Extension(caller): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<TelegramLink>,
) -> Result<Json<UserView>, ServerError> {
    if !state.is_chat_relay(&caller) {
        return Err(EngineError::Forbidden("only the chat relay can link chats".to_string()).into());
    }
    let user = state
        .engine
        .link_telegram(&payload.email, payload.telegram_id)
        .await?;
    tracing::debug!(caller = %caller.id, user_id = %user.id, "link requested by chat relay");
    Ok(Json(user_view(user)))
}
