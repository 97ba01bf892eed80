//! Transaction shares.
//!
//! A [`TransactionShare`] is one party's portion of a shared
//! [`Transaction`](crate::Transaction), stored both as a percentage and as an
//! absolute amount. Shares are exclusively owned by their transaction.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, Money, Percent, util};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionShare {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: String,
    pub percentage: Percent,
    pub amount: Money,
}

impl TransactionShare {
    pub fn new(transaction_id: Uuid, user_id: String, percentage: Percent, amount: Money) -> Self {
        Self {
            id: Uuid::now_v7(),
            transaction_id,
            user_id,
            percentage,
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_shares")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub user_id: String,
    pub percentage_bp: i64,
    pub amount_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TransactionShare> for ActiveModel {
    fn from(share: &TransactionShare) -> Self {
        Self {
            id: ActiveValue::Set(share.id.to_string()),
            transaction_id: ActiveValue::Set(share.transaction_id.to_string()),
            user_id: ActiveValue::Set(share.user_id.clone()),
            percentage_bp: ActiveValue::Set(share.percentage.basis_points()),
            amount_minor: ActiveValue::Set(share.amount.cents()),
        }
    }
}

impl TryFrom<Model> for TransactionShare {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "share")?,
            transaction_id: util::parse_uuid(&model.transaction_id, "transaction")?,
            user_id: model.user_id,
            percentage: Percent::new(model.percentage_bp),
            amount: Money::new(model.amount_minor),
        })
    }
}
