//! Scopes (budgets) API endpoints.

use api_types::{
    ListParams, Page,
    scope::{RenewalPeriod as ApiPeriod, ScopeNew, ScopeOverviewView, ScopeUpdate, ScopeView},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{ListQuery, Money, NewScopeCmd, RenewalPeriod, Scope, ScopePatch, User};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn map_period(period: RenewalPeriod) -> ApiPeriod {
    match period {
        RenewalPeriod::Weekly => ApiPeriod::Weekly,
        RenewalPeriod::Monthly => ApiPeriod::Monthly,
        RenewalPeriod::Yearly => ApiPeriod::Yearly,
    }
}

fn engine_period(period: ApiPeriod) -> RenewalPeriod {
    match period {
        ApiPeriod::Weekly => RenewalPeriod::Weekly,
        ApiPeriod::Monthly => RenewalPeriod::Monthly,
        ApiPeriod::Yearly => RenewalPeriod::Yearly,
    }
}

fn scope_view(scope: Scope) -> ScopeView {
    ScopeView {
        id: scope.id,
        name: scope.name,
        amount_minor: scope.amount.cents(),
        start_date: scope.start_date,
        end_date: scope.end_date,
        auto_renew: scope.auto_renew,
        renewal_period: scope.renewal_period.map(map_period),
        categories: scope.categories,
        created_at: scope.created_at,
        updated_at: scope.updated_at,
    }
}

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<ScopeView>>, ServerError> {
    let query = ListQuery {
        keyword: params.keyword,
        page: params.page,
        size: params.size,
    };
    let page = state.engine.scopes(&user.id, &query).await?;
    Ok(Json(Page {
        items: page.items.into_iter().map(scope_view).collect(),
        total: page.total,
        page: page.page,
        size: page.size,
    }))
}

pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<ScopeNew>,
) -> Result<(StatusCode, Json<ScopeView>), ServerError> {
    let cmd = NewScopeCmd {
        start_date: payload.start_date,
        end_date: payload.end_date,
        auto_renew: payload.auto_renew,
        renewal_period: payload.renewal_period.map(engine_period),
        ..NewScopeCmd::new(&user.id, payload.name, Money::new(payload.amount_minor))
    }
    .categories(payload.categories);

    let scope = state.engine.new_scope(cmd).await?;
    Ok((StatusCode::CREATED, Json(scope_view(scope))))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(scope_id): Path<Uuid>,
) -> Result<Json<ScopeView>, ServerError> {
    let scope = state.engine.scope(scope_id, &user.id).await?;
    Ok(Json(scope_view(scope)))
}

pub async fn update(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(scope_id): Path<Uuid>,
    Json(payload): Json<ScopeUpdate>,
) -> Result<Json<ScopeView>, ServerError> {
    let patch = ScopePatch {
        name: payload.name,
        amount: payload.amount_minor.map(Money::new),
        start_date: payload.start_date,
        end_date: payload.end_date,
        auto_renew: payload.auto_renew,
        renewal_period: payload.renewal_period.map(|p| p.map(engine_period)),
        categories: payload.categories,
    };
    let scope = state.engine.update_scope(scope_id, &user.id, patch).await?;
    Ok(Json(scope_view(scope)))
}

pub async fn delete(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(scope_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_scope(scope_id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Every scope of the acting user with its current spending.
pub async fn overviews(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<ScopeOverviewView>>, ServerError> {
    let overviews = state.engine.scope_overviews(&user.id).await?;
    Ok(Json(
        overviews
            .into_iter()
            .map(|overview| ScopeOverviewView {
                total_amount_transaction_minor: overview.total_amount_transaction.cents(),
                leftout_minor: overview.leftout.cents(),
                progress: overview.progress.to_string(),
                scope: scope_view(overview.scope),
            })
            .collect(),
    ))
}
