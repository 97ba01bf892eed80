//! Transaction primitives.
//!
//! A `Transaction` is a single income or expense of one user. A shared
//! expense owns exactly two [`TransactionShare`]s whose amounts add up to the
//! transaction amount.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, TransactionShare, util};

use super::transaction_shares;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub category: String,
    pub transaction_type: TransactionType,
    pub description: String,
    pub amount: Money,
    pub spent_at: DateTime<Utc>,
    pub is_shared: bool,
    pub shares: Vec<TransactionShare>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        user_id: String,
        transaction_type: TransactionType,
        category: String,
        description: String,
        amount: Money,
        spent_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            user_id,
            category,
            transaction_type,
            description,
            amount,
            spent_at,
            is_shared: false,
            shares: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Sum of all share amounts.
    #[must_use]
    pub fn shares_total(&self) -> Money {
        self.shares.iter().map(|s| s.amount).sum()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub category_key: String,
    pub transaction_type: String,
    pub description: String,
    pub amount_minor: i64,
    pub spent_at: DateTimeUtc,
    pub is_shared: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction_shares::Entity")]
    Shares,
}

impl Related<super::transaction_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            category: ActiveValue::Set(tx.category.clone()),
            category_key: ActiveValue::Set(util::category_key(&tx.category)),
            transaction_type: ActiveValue::Set(tx.transaction_type.as_str().to_string()),
            description: ActiveValue::Set(tx.description.clone()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            spent_at: ActiveValue::Set(tx.spent_at),
            is_shared: ActiveValue::Set(tx.is_shared),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
            deleted_at: ActiveValue::Set(tx.deleted_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "transaction")?,
            user_id: model.user_id,
            category: model.category,
            transaction_type: TransactionType::try_from(model.transaction_type.as_str())?,
            description: model.description,
            amount: Money::new(model.amount_minor),
            spent_at: model.spent_at,
            is_shared: model.is_shared,
            shares: Vec::new(),
            created_at: model.created_at,
            updated_at: model.updated_at,
            deleted_at: model.deleted_at,
        })
    }
}

impl TryFrom<(Model, Vec<transaction_shares::Model>)> for Transaction {
    type Error = EngineError;

    fn try_from((model, shares): (Model, Vec<transaction_shares::Model>)) -> ResultEngine<Self> {
        let mut tx = Transaction::try_from(model)?;
        tx.shares = shares
            .into_iter()
            .map(TransactionShare::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        // Owner's share first.
        tx.shares.sort_by_key(|s| s.user_id != tx.user_id);
        Ok(tx)
    }
}
