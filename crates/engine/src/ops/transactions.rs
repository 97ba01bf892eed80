use std::collections::HashMap;

use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, NewTransactionCmd, Page, ResultEngine, Transaction, allocate, transaction_shares,
    transactions, util,
};

use super::Engine;

mod list;
mod write;

/// A page of transactions, each with its shares.
pub type TransactionPage = Page<Transaction>;

/// Builds a transaction and its shares from `cmd`.
///
/// `counterpart` is only consulted when the split is shared.
pub(super) fn build_transaction(
    cmd: NewTransactionCmd,
    counterpart: Option<&str>,
) -> ResultEngine<Transaction> {
    let description = util::normalize_optional_text(cmd.description.as_deref());
    let category = util::normalize_optional_text(cmd.category.as_deref()).unwrap_or_else(|| {
        description
            .as_deref()
            .map_or_else(|| util::UNCATEGORIZED.to_string(), util::infer_category)
    });
    let description = description.unwrap_or_else(|| category.clone());

    let mut tx = Transaction::new(
        cmd.user_id,
        cmd.transaction_type,
        category,
        description,
        cmd.amount,
        cmd.spent_at,
    )?;
    tx.shares = allocate(tx.id, tx.amount, &tx.user_id, counterpart, &cmd.split)?;
    tx.is_shared = !tx.shares.is_empty();
    Ok(tx)
}

/// Inserts `tx` and its shares. Callers run this inside `with_tx!`.
pub(super) async fn insert_transaction<C>(db: &C, tx: &Transaction) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    let model: transactions::ActiveModel = tx.into();
    model.insert(db).await?;
    insert_shares(db, &tx.shares).await
}

pub(super) async fn insert_shares<C>(
    db: &C,
    shares: &[crate::TransactionShare],
) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    if shares.is_empty() {
        return Ok(());
    }
    let models: Vec<transaction_shares::ActiveModel> = shares.iter().map(Into::into).collect();
    transaction_shares::Entity::insert_many(models).exec(db).await?;
    Ok(())
}

/// Loads a live (not soft-deleted) transaction with its shares.
pub(super) async fn find_live<C>(db: &C, transaction_id: Uuid) -> ResultEngine<Transaction>
where
    C: ConnectionTrait,
{
    let model = transactions::Entity::find_by_id(transaction_id.to_string())
        .filter(transactions::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
    let shares = model
        .find_related(transaction_shares::Entity)
        .order_by_asc(transaction_shares::Column::Id)
        .all(db)
        .await?;
    Transaction::try_from((model, shares))
}

/// Attaches shares to already loaded transaction rows, keeping row order.
pub(super) async fn with_shares<C>(
    db: &C,
    models: Vec<transactions::Model>,
) -> ResultEngine<Vec<Transaction>>
where
    C: ConnectionTrait,
{
    let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
    let mut shares_by_tx: HashMap<String, Vec<transaction_shares::Model>> = HashMap::new();
    if !ids.is_empty() {
        let shares = transaction_shares::Entity::find()
            .filter(transaction_shares::Column::TransactionId.is_in(ids))
            .order_by_asc(transaction_shares::Column::Id)
            .all(db)
            .await?;
        for share in shares {
            shares_by_tx
                .entry(share.transaction_id.clone())
                .or_default()
                .push(share);
        }
    }

    models
        .into_iter()
        .map(|model| {
            let shares = shares_by_tx.remove(&model.id).unwrap_or_default();
            Transaction::try_from((model, shares))
        })
        .collect()
}

impl Engine {
    /// Returns a transaction with its shares.
    ///
    /// Readable by its owner and by any party holding a share.
    pub async fn transaction(&self, transaction_id: Uuid, user_id: &str) -> ResultEngine<Transaction> {
        let tx = find_live(&self.database, transaction_id).await?;
        let is_party = tx.user_id == user_id || tx.shares.iter().any(|s| s.user_id == user_id);
        if !is_party {
            return Err(EngineError::Forbidden(
                "transaction belongs to another user".to_string(),
            ));
        }
        Ok(tx)
    }
}
