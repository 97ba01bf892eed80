//! Wallets API endpoints.

use api_types::{
    ListParams, Page,
    wallet::{WalletNew, WalletRename, WalletView},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{ListQuery, Money, User, Wallet};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn wallet_view(wallet: Wallet) -> WalletView {
    WalletView {
        id: wallet.id,
        name: wallet.name,
        balance_minor: wallet.balance.cents(),
        created_at: wallet.created_at,
    }
}

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<WalletView>>, ServerError> {
    let query = ListQuery {
        keyword: params.keyword,
        page: params.page,
        size: params.size,
    };
    let page = state.engine.wallets(&user.id, &query).await?;
    Ok(Json(Page {
        items: page.items.into_iter().map(wallet_view).collect(),
        total: page.total,
        page: page.page,
        size: page.size,
    }))
}

pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<WalletNew>,
) -> Result<(StatusCode, Json<WalletView>), ServerError> {
    let wallet = state
        .engine
        .new_wallet(&user.id, &payload.name, Money::new(payload.balance_minor))
        .await?;
    Ok((StatusCode::CREATED, Json(wallet_view(wallet))))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state.engine.wallet(wallet_id, &user.id).await?;
    Ok(Json(wallet_view(wallet)))
}

pub async fn rename(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(wallet_id): Path<Uuid>,
    Json(payload): Json<WalletRename>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state
        .engine
        .rename_wallet(wallet_id, &user.id, &payload.name)
        .await?;
    Ok(Json(wallet_view(wallet)))
}

pub async fn delete(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_wallet(wallet_id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
