use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    EngineError, ListQuery, Money, NewScopeCmd, Page, RenewalPeriod, ResultEngine, Scope,
    ScopeOverview, ScopePatch, scope_categories, scopes, transactions, util,
};

use super::{Engine, keyword_condition, with_tx};

/// Trims the tags and drops blanks and duplicates (by category key),
/// keeping the first spelling.
fn normalize_categories(categories: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(util::category_key(c)))
        .map(ToString::to_string)
        .collect()
}

fn validate_scope(
    amount: Money,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    auto_renew: bool,
    renewal_period: Option<RenewalPeriod>,
) -> ResultEngine<()> {
    if amount.is_negative() {
        return Err(EngineError::InvalidAmount(
            "scope amount must be >= 0".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (start_date, end_date)
        && end < start
    {
        return Err(EngineError::InvalidInput(
            "invalid range: end_date must not precede start_date".to_string(),
        ));
    }
    if auto_renew && renewal_period.is_none() {
        return Err(EngineError::InvalidInput(
            "renewal_period is required when auto_renew is set".to_string(),
        ));
    }
    Ok(())
}

async fn require_scope<C>(db: &C, scope_id: Uuid, user_id: &str) -> ResultEngine<scopes::Model>
where
    C: ConnectionTrait,
{
    let model = scopes::Entity::find_by_id(scope_id.to_string())
        .filter(scopes::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("scope not exists".to_string()))?;
    if model.user_id != user_id {
        return Err(EngineError::Forbidden(
            "scope belongs to another user".to_string(),
        ));
    }
    Ok(model)
}

/// Attaches the category rows to each scope, keeping the scope order.
async fn with_categories<C>(db: &C, models: Vec<scopes::Model>) -> ResultEngine<Vec<Scope>>
where
    C: ConnectionTrait,
{
    let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
    let mut by_scope: HashMap<String, Vec<scope_categories::Model>> = HashMap::new();
    if !ids.is_empty() {
        let rows = scope_categories::Entity::find()
            .filter(scope_categories::Column::ScopeId.is_in(ids))
            .order_by_asc(scope_categories::Column::Id)
            .all(db)
            .await?;
        for row in rows {
            by_scope.entry(row.scope_id.clone()).or_default().push(row);
        }
    }
    models
        .into_iter()
        .map(|model| {
            let categories = by_scope.remove(&model.id).unwrap_or_default();
            Scope::try_from((model, categories))
        })
        .collect()
}

async fn replace_categories<C>(db: &C, scope_id: Uuid, categories: &[String]) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    scope_categories::Entity::delete_many()
        .filter(scope_categories::Column::ScopeId.eq(scope_id.to_string()))
        .exec(db)
        .await?;
    let rows = scope_categories::rows_for(scope_id, categories);
    if !rows.is_empty() {
        scope_categories::Entity::insert_many(rows).exec(db).await?;
    }
    Ok(())
}

/// Sum of the live transactions whose category key is in `keys`, whoever
/// recorded them.
async fn matched_total<C>(db: &C, keys: &[String]) -> ResultEngine<Money>
where
    C: ConnectionTrait,
{
    if keys.is_empty() {
        return Ok(Money::ZERO);
    }
    let total: Option<Option<i64>> = transactions::Entity::find()
        .select_only()
        .column_as(Expr::col(transactions::Column::AmountMinor).sum(), "total")
        .filter(transactions::Column::DeletedAt.is_null())
        .filter(transactions::Column::CategoryKey.is_in(keys.iter().cloned()))
        .into_tuple()
        .one(db)
        .await?;
    Ok(Money::new(total.flatten().unwrap_or(0)))
}

impl Engine {
    /// Creates a scope with its category tags.
    pub async fn new_scope(&self, cmd: NewScopeCmd) -> ResultEngine<Scope> {
        let name = util::normalize_required_text(&cmd.name, "scope name")?;
        validate_scope(
            cmd.amount,
            cmd.start_date,
            cmd.end_date,
            cmd.auto_renew,
            cmd.renewal_period,
        )?;
        let now = Utc::now();
        let scope = Scope {
            id: Uuid::now_v7(),
            user_id: cmd.user_id,
            name,
            amount: cmd.amount,
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            auto_renew: cmd.auto_renew,
            renewal_period: cmd.renewal_period.filter(|_| cmd.auto_renew),
            categories: normalize_categories(&cmd.categories),
            created_at: now,
            updated_at: now,
        };

        with_tx!(self, |db_tx| {
            let model: scopes::ActiveModel = (&scope).into();
            model.insert(&db_tx).await?;
            replace_categories(&db_tx, scope.id, &scope.categories).await?;
            tracing::info!(scope_id = %scope.id, "scope created");
            Ok(scope)
        })
    }

    /// Lists the live scopes of `user_id`, oldest first.
    pub async fn scopes(&self, user_id: &str, query: &ListQuery) -> ResultEngine<Page<Scope>> {
        let page = query.page_number();
        let size = query.page_size();
        let offset = query.offset()?;

        let mut select = scopes::Entity::find()
            .filter(scopes::Column::UserId.eq(user_id))
            .filter(scopes::Column::DeletedAt.is_null());
        if let Some(condition) = keyword_condition(&[scopes::Column::Name], query.keyword.as_deref())
        {
            select = select.filter(condition);
        }

        let total = select.clone().count(&self.database).await?;
        let models = select
            .order_by_asc(scopes::Column::CreatedAt)
            .order_by_asc(scopes::Column::Id)
            .offset(offset)
            .limit(size)
            .all(&self.database)
            .await?;
        let items = with_categories(&self.database, models).await?;

        Ok(Page {
            items,
            total,
            page,
            size,
        })
    }

    pub async fn scope(&self, scope_id: Uuid, user_id: &str) -> ResultEngine<Scope> {
        let model = require_scope(&self.database, scope_id, user_id).await?;
        let mut scopes = with_categories(&self.database, vec![model]).await?;
        scopes
            .pop()
            .ok_or_else(|| EngineError::KeyNotFound("scope not exists".to_string()))
    }

    /// Applies `patch` to a scope owned by `user_id`. A new category set
    /// replaces the old one in the same DB transaction.
    pub async fn update_scope(
        &self,
        scope_id: Uuid,
        user_id: &str,
        patch: ScopePatch,
    ) -> ResultEngine<Scope> {
        with_tx!(self, |db_tx| {
            let model = require_scope(&db_tx, scope_id, user_id).await?;
            let mut scope = with_categories(&db_tx, vec![model])
                .await?
                .pop()
                .ok_or_else(|| EngineError::KeyNotFound("scope not exists".to_string()))?;

            if let Some(name) = patch.name.as_deref() {
                scope.name = util::normalize_required_text(name, "scope name")?;
            }
            if let Some(amount) = patch.amount {
                scope.amount = amount;
            }
            if let Some(start_date) = patch.start_date {
                scope.start_date = start_date;
            }
            if let Some(end_date) = patch.end_date {
                scope.end_date = end_date;
            }
            if let Some(auto_renew) = patch.auto_renew {
                scope.auto_renew = auto_renew;
            }
            if let Some(renewal_period) = patch.renewal_period {
                scope.renewal_period = renewal_period;
            }
            validate_scope(
                scope.amount,
                scope.start_date,
                scope.end_date,
                scope.auto_renew,
                scope.renewal_period,
            )?;
            if !scope.auto_renew {
                scope.renewal_period = None;
            }
            scope.updated_at = Utc::now();

            let mut active: scopes::ActiveModel = (&scope).into();
            active.created_at = ActiveValue::NotSet;
            active.update(&db_tx).await?;

            if let Some(categories) = patch.categories.as_deref() {
                scope.categories = normalize_categories(categories);
                replace_categories(&db_tx, scope.id, &scope.categories).await?;
            }
            Ok(scope)
        })
    }

    /// Soft-deletes a scope owned by `user_id` and drops its category tags.
    pub async fn delete_scope(&self, scope_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_scope(&db_tx, scope_id, user_id).await?;
            replace_categories(&db_tx, scope_id, &[]).await?;

            let now = Utc::now();
            let active = scopes::ActiveModel {
                id: ActiveValue::Set(scope_id.to_string()),
                deleted_at: ActiveValue::Set(Some(now)),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Every live scope of `user_id` with the transactions it currently
    /// matches, including the ones recorded by other users.
    ///
    /// A transaction counts once per scope even when several tags of the
    /// scope share its category key.
    pub async fn scope_overviews(&self, user_id: &str) -> ResultEngine<Vec<ScopeOverview>> {
        let models = scopes::Entity::find()
            .filter(scopes::Column::UserId.eq(user_id))
            .filter(scopes::Column::DeletedAt.is_null())
            .order_by_asc(scopes::Column::CreatedAt)
            .order_by_asc(scopes::Column::Id)
            .all(&self.database)
            .await?;
        let scopes = with_categories(&self.database, models).await?;

        let mut overviews = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let keys: Vec<String> = scope
                .categories
                .iter()
                .map(|c| util::category_key(c))
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let total = matched_total(&self.database, &keys).await?;
            overviews.push(ScopeOverview::new(scope, total));
        }
        Ok(overviews)
    }
}
