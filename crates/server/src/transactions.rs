//! Transactions API endpoints

use std::collections::HashMap;

use api_types::{
    Page,
    transaction::{
        RecognizeRequest, ShareView, SplitSpec, SplitTotalsView, SummaryParams, SummaryView,
        TransactionListParams, TransactionNew, TransactionType as ApiType, TransactionUpdate,
        TransactionView,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{
    EngineError, ListQuery, Money, NewTransactionCmd, Percent, Split, SplitTotals, Transaction,
    TransactionPatch, TransactionQuery, TransactionType, User, parse_sort,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn map_type(kind: TransactionType) -> ApiType {
    match kind {
        TransactionType::Income => ApiType::Income,
        TransactionType::Expense => ApiType::Expense,
    }
}

fn engine_type(kind: ApiType) -> TransactionType {
    match kind {
        ApiType::Income => TransactionType::Income,
        ApiType::Expense => TransactionType::Expense,
    }
}

fn engine_split(spec: SplitSpec) -> Result<Split, ServerError> {
    Ok(match spec {
        SplitSpec::None => Split::Unshared,
        SplitSpec::Percentages { values } => Split::Percentages(
            values
                .iter()
                .map(|v| v.parse::<Percent>())
                .collect::<Result<_, _>>()?,
        ),
        SplitSpec::Amounts { values_minor } => {
            Split::Amounts(values_minor.into_iter().map(Money::new).collect())
        }
    })
}

fn map_totals(totals: SplitTotals) -> SplitTotalsView {
    SplitTotalsView {
        me_minor: totals.me.cents(),
        shared_minor: totals.shared.cents(),
    }
}

/// Display names of the share holders of `txs`, by user id.
async fn user_names(
    state: &ServerState,
    txs: &[Transaction],
) -> Result<HashMap<String, String>, ServerError> {
    let mut ids: Vec<String> = txs
        .iter()
        .flat_map(|tx| tx.shares.iter().map(|share| share.user_id.clone()))
        .collect();
    ids.sort();
    ids.dedup();

    Ok(state
        .engine
        .users_by_ids(&ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user.name))
        .collect())
}

fn transaction_view(tx: Transaction, names: &HashMap<String, String>) -> TransactionView {
    TransactionView {
        id: tx.id,
        user_id: tx.user_id,
        transaction_type: map_type(tx.transaction_type),
        category: tx.category,
        description: tx.description,
        amount_minor: tx.amount.cents(),
        spent_at: tx.spent_at,
        is_shared: tx.is_shared,
        shares: tx
            .shares
            .into_iter()
            .map(|share| ShareView {
                user_name: names.get(&share.user_id).cloned(),
                user_id: share.user_id,
                percentage: share.percentage.to_string(),
                amount_minor: share.amount.cents(),
            })
            .collect(),
        created_at: tx.created_at,
        updated_at: tx.updated_at,
    }
}

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(params): Query<TransactionListParams>,
) -> Result<Json<Page<TransactionView>>, ServerError> {
    let query = TransactionQuery {
        list: ListQuery {
            keyword: params.keyword,
            page: params.page,
            size: params.size,
        },
        sort: parse_sort(params.sort.as_deref().unwrap_or_default())?,
    };
    let page = state.engine.transactions(&user.id, &query).await?;
    let names = user_names(&state, &page.items).await?;

    Ok(Json(Page {
        items: page
            .items
            .into_iter()
            .map(|tx| transaction_view(tx, &names))
            .collect(),
        total: page.total,
        page: page.page,
        size: page.size,
    }))
}

pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let spent_at = payload
        .spent_at
        .map_or_else(Utc::now, |at| at.with_timezone(&Utc));
    let mut cmd = NewTransactionCmd::new(
        &user.id,
        engine_type(payload.transaction_type),
        Money::new(payload.amount_minor),
        spent_at,
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(category) = payload.category {
        cmd = cmd.category(category);
    }
    if let Some(split) = payload.split {
        cmd = cmd.split(engine_split(split)?);
    }
    if let Some(counterpart) = payload.counterpart_id {
        cmd = cmd.counterpart(counterpart);
    }

    let tx = state.engine.create_transaction(cmd).await?;
    let names = user_names(&state, std::slice::from_ref(&tx)).await?;
    Ok((StatusCode::CREATED, Json(transaction_view(tx, &names))))
}

/// Recognises free text and stores the resulting expense.
pub async fn recognize(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<RecognizeRequest>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let Some(recognizer) = state.recognizer.as_deref() else {
        tracing::warn!("recognition requested but no recognizer is configured");
        return Err(EngineError::RecognitionFailed("recognizer not configured".to_string()).into());
    };

    let tx = state
        .engine
        .record_from_text(recognizer, &user.id, &payload.text)
        .await?;
    let names = user_names(&state, std::slice::from_ref(&tx)).await?;
    Ok((StatusCode::CREATED, Json(transaction_view(tx, &names))))
}

pub async fn summary(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryView>, ServerError> {
    let summary = state
        .engine
        .period_summary(&user.id, params.start_date, params.end_date)
        .await?;

    Ok(Json(SummaryView {
        start_date: summary.start_date,
        end_date: summary.end_date,
        user_id: summary.user_id,
        counterpart_id: summary.counterpart_id,
        total_income_minor: summary.total_income.cents(),
        total_expense_minor: summary.total_expense.cents(),
        counterpart_expense_minor: summary.counterpart_expense.cents(),
        total_splited: map_totals(summary.total_splited),
        counterpart_splited: map_totals(summary.counterpart_splited),
    }))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let tx = state.engine.transaction(transaction_id, &user.id).await?;
    let names = user_names(&state, std::slice::from_ref(&tx)).await?;
    Ok(Json(transaction_view(tx, &names)))
}

pub async fn update(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<Json<TransactionView>, ServerError> {
    let mut patch = TransactionPatch::new();
    if let Some(kind) = payload.transaction_type {
        patch = patch.transaction_type(engine_type(kind));
    }
    if let Some(amount_minor) = payload.amount_minor {
        patch = patch.amount(Money::new(amount_minor));
    }
    if let Some(spent_at) = payload.spent_at {
        patch = patch.spent_at(spent_at.with_timezone(&Utc));
    }
    if let Some(description) = payload.description {
        patch = patch.description(description);
    }
    if let Some(category) = payload.category {
        patch = patch.category(category);
    }
    if let Some(split) = payload.split {
        patch = patch.split(engine_split(split)?);
    }
    if let Some(counterpart) = payload.counterpart_id {
        patch = patch.counterpart(counterpart);
    }

    let tx = state
        .engine
        .update_transaction(transaction_id, &user.id, patch)
        .await?;
    let names = user_names(&state, std::slice::from_ref(&tx)).await?;
    Ok(Json(transaction_view(tx, &names)))
}

pub async fn delete(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_transaction(transaction_id, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
