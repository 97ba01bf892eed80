use std::{future::IntoFuture, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, Error as AxumError, Header, authorization::Basic},
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::watch};

use crate::{scopes, transactions, user, wallets};
use engine::{Engine, Recognizer, User};

static TELEGRAM_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("telegram-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Text recognizer; recognition endpoints fail when it is missing.
    pub recognizer: Option<Arc<dyn Recognizer>>,
    /// Email of the chat bot's service account, the only account allowed to
    /// link chats and to act for them. `None` disables both.
    pub chat_relay: Option<String>,
}

impl ServerState {
    pub(crate) fn is_chat_relay(&self, user: &User) -> bool {
        self.chat_relay
            .as_deref()
            .is_some_and(|email| email.trim().eq_ignore_ascii_case(&user.email))
    }
}

/// `TypedHeader` for custom telegram header
///
/// Requests relayed by the chat bot carry the chat id in "telegram-user-id";
/// the request then acts as the account linked to that chat.
#[derive(Debug)]
struct TelegramHeader(i64);

impl Header for TelegramHeader {
    fn name() -> &'static axum::http::HeaderName {
        &TELEGRAM_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let Ok(value) = value.trim().parse() else {
            return Err(AxumError::invalid());
        };

        Ok(TelegramHeader(value))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        let as_string = self.0.to_string();
        match axum::http::HeaderValue::from_str(&as_string) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode telegram-user-id header"),
        }
    }
}

async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    telegram_header: Option<TypedHeader<TelegramHeader>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(credentials)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if credentials.username().is_empty() || credentials.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let mut user = state
        .engine
        .authenticate(credentials.username(), credentials.password())
        .await
        .map_err(|err| {
            tracing::error!("authentication lookup failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if let Some(TypedHeader(TelegramHeader(chat_id))) = telegram_header {
        if !state.is_chat_relay(&user) {
            tracing::warn!(user_id = %user.id, "chat header sent by a non relay account");
            return Err(StatusCode::FORBIDDEN);
        }
        user = state
            .engine
            .user_by_telegram_id(chat_id)
            .await
            .map_err(|err| {
                tracing::error!("chat identity lookup failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;
    }

    tracing::debug!(user_id = %user.id, path = %request.uri().path(), "authenticated request");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub fn router(state: ServerState) -> Router {
    let protected = Router::new()
        .route("/users/me", get(user::me))
        .route("/users/telegram", post(user::link_telegram))
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route("/transactions/recognize", post(transactions::recognize))
        .route("/transactions/summary", get(transactions::summary))
        .route(
            "/transactions/{id}",
            get(transactions::get)
                .put(transactions::update)
                .delete(transactions::delete),
        )
        .route("/scopes", get(scopes::list).post(scopes::create))
        .route("/scopes/overviews", get(scopes::overviews))
        .route(
            "/scopes/{id}",
            get(scopes::get).put(scopes::update).delete(scopes::delete),
        )
        .route("/wallets", get(wallets::list).post(wallets::create))
        .route(
            "/wallets/{id}",
            get(wallets::get)
                .put(wallets::rename)
                .delete(wallets::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    let api = Router::new().route("/health", get(health)).merge(protected);

    Router::new().nest("/api/v1", api).with_state(state)
}

/// Resolves once `shutdown` reads `true` or its sender is gone.
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub async fn run(
    bind: &str,
    port: u16,
    state: ServerState,
    shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind((bind, port)).await?;
    run_with_listener(state, listener, shutdown, grace).await
}

/// Serves until `shutdown` flips, then gives in-flight requests `grace`
/// to complete before returning.
pub async fn run_with_listener(
    state: ServerState,
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let serve = axum::serve(listener, router(state))
        .with_graceful_shutdown(stopped(shutdown.clone()))
        .into_future();
    tokio::pin!(serve);

    let deadline = async move {
        stopped(shutdown).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = &mut serve => {
            tracing::info!("Server stopped");
            result
        }
        () = deadline => {
            tracing::warn!(?grace, "grace period elapsed, dropping in-flight requests");
            Ok(())
        }
    }
}
