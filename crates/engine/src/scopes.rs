//! Spending scopes (budgets).
//!
//! A [`Scope`] is a named ceiling over a set of category tags. It does not
//! own transactions: they are matched by normalised category key.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, Percent, util};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl RenewalPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl TryFrom<&str> for RenewalPeriod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EngineError::InvalidInput(format!(
                "invalid renewal period: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Spending ceiling.
    pub amount: Money,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub auto_renew: bool,
    pub renewal_period: Option<RenewalPeriod>,
    /// Category tags, in insertion order.
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A scope with the transactions it currently matches.
///
/// `leftout` goes negative and `progress` above 100% on overspend; neither
/// is clamped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeOverview {
    pub scope: Scope,
    pub total_amount_transaction: Money,
    pub leftout: Money,
    pub progress: Percent,
}

impl ScopeOverview {
    pub fn new(scope: Scope, total_amount_transaction: Money) -> Self {
        let leftout = scope.amount - total_amount_transaction;
        let progress = total_amount_transaction.percent_of(scope.amount);
        Self {
            scope,
            total_amount_transaction,
            leftout,
            progress,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scopes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub amount_minor: i64,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub auto_renew: bool,
    pub renewal_period: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::scope_categories::Entity")]
    Categories,
}

impl Related<super::scope_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Scope> for ActiveModel {
    fn from(scope: &Scope) -> Self {
        Self {
            id: ActiveValue::Set(scope.id.to_string()),
            user_id: ActiveValue::Set(scope.user_id.clone()),
            name: ActiveValue::Set(scope.name.clone()),
            amount_minor: ActiveValue::Set(scope.amount.cents()),
            start_date: ActiveValue::Set(scope.start_date),
            end_date: ActiveValue::Set(scope.end_date),
            auto_renew: ActiveValue::Set(scope.auto_renew),
            renewal_period: ActiveValue::Set(
                scope.renewal_period.map(|p| p.as_str().to_string()),
            ),
            created_at: ActiveValue::Set(scope.created_at),
            updated_at: ActiveValue::Set(scope.updated_at),
            deleted_at: ActiveValue::Set(None),
        }
    }
}

impl TryFrom<(Model, Vec<super::scope_categories::Model>)> for Scope {
    type Error = EngineError;

    fn try_from(
        (model, categories): (Model, Vec<super::scope_categories::Model>),
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "scope")?,
            user_id: model.user_id,
            name: model.name,
            amount: Money::new(model.amount_minor),
            start_date: model.start_date,
            end_date: model.end_date,
            auto_renew: model.auto_renew,
            renewal_period: model
                .renewal_period
                .as_deref()
                .map(RenewalPeriod::try_from)
                .transpose()?,
            categories: categories.into_iter().map(|c| c.category).collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
