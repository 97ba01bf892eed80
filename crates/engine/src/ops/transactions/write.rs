use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, NewTransactionCmd, ResultEngine, Transaction, TransactionPatch, allocate,
    reallocate, transaction_shares, transactions, users, util,
};

use super::super::{Engine, users::find_counterpart, with_tx};
use super::{build_transaction, find_live, insert_shares, insert_transaction};

impl Engine {
    /// Resolves the second party of a shared split.
    ///
    /// An explicit counterpart must exist; otherwise the default counterpart
    /// of `owner` is used.
    async fn resolve_counterpart(
        &self,
        db_tx: &DatabaseTransaction,
        owner: &str,
        explicit: Option<&str>,
    ) -> ResultEngine<Option<String>> {
        match explicit {
            Some(user_id) => {
                users::Entity::find_by_id(user_id.to_string())
                    .one(db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("counterpart not exists".to_string()))?;
                Ok(Some(user_id.to_string()))
            }
            None => Ok(find_counterpart(db_tx, owner).await?.map(|user| user.id)),
        }
    }

    /// Creates a transaction and its shares in one atomic unit.
    pub async fn create_transaction(&self, cmd: NewTransactionCmd) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let counterpart = if cmd.split.is_shared() {
                self.resolve_counterpart(&db_tx, &cmd.user_id, cmd.counterpart.as_deref())
                    .await?
            } else {
                None
            };
            let tx = build_transaction(cmd, counterpart.as_deref())?;
            insert_transaction(&db_tx, &tx).await?;
            tracing::debug!(
                transaction_id = %tx.id,
                shares = tx.shares.len(),
                "transaction created"
            );
            Ok(tx)
        })
    }

    /// Applies `patch` to a transaction owned by `user_id`.
    ///
    /// A new split replaces the shares and is validated against the resulting
    /// amount. An amount change without a new split re-derives the existing
    /// shares from their stored percentages.
    pub async fn update_transaction(
        &self,
        transaction_id: Uuid,
        user_id: &str,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        if patch.is_empty() {
            return Err(EngineError::InvalidInput("nothing to update".to_string()));
        }

        with_tx!(self, |db_tx| {
            let current = find_live(&db_tx, transaction_id).await?;
            if current.user_id != user_id {
                return Err(EngineError::Forbidden(
                    "transaction belongs to another user".to_string(),
                ));
            }

            let amount = patch.amount.unwrap_or(current.amount);
            if !amount.is_positive() {
                return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
            }

            let shares = match &patch.split {
                Some(split) => {
                    let counterpart = if split.is_shared() {
                        let explicit = patch.counterpart.as_deref().or_else(|| {
                            current
                                .shares
                                .iter()
                                .find(|s| s.user_id != current.user_id)
                                .map(|s| s.user_id.as_str())
                        });
                        self.resolve_counterpart(&db_tx, user_id, explicit).await?
                    } else {
                        None
                    };
                    Some(allocate(
                        current.id,
                        amount,
                        user_id,
                        counterpart.as_deref(),
                        split,
                    )?)
                }
                None if amount != current.amount && !current.shares.is_empty() => {
                    Some(reallocate(amount, &current.shares)?)
                }
                None => None,
            };

            let mut active: transactions::ActiveModel = (&current).into();
            if let Some(kind) = patch.transaction_type {
                active.transaction_type = ActiveValue::Set(kind.as_str().to_string());
            }
            if let Some(spent_at) = patch.spent_at {
                active.spent_at = ActiveValue::Set(spent_at);
            }
            if let Some(description) = patch.description.as_deref() {
                active.description =
                    ActiveValue::Set(util::normalize_required_text(description, "description")?);
            }
            if let Some(category) = patch.category.as_deref() {
                let category = util::normalize_required_text(category, "category")?;
                active.category_key = ActiveValue::Set(util::category_key(&category));
                active.category = ActiveValue::Set(category);
            }
            active.amount_minor = ActiveValue::Set(amount.cents());
            if let Some(shares) = &shares {
                active.is_shared = ActiveValue::Set(!shares.is_empty());
            }
            active.updated_at = ActiveValue::Set(Utc::now());
            active.update(&db_tx).await?;

            if let Some(shares) = shares {
                transaction_shares::Entity::delete_many()
                    .filter(transaction_shares::Column::TransactionId.eq(current.id.to_string()))
                    .exec(&db_tx)
                    .await?;
                insert_shares(&db_tx, &shares).await?;
            }

            let updated = find_live(&db_tx, transaction_id).await?;
            Ok(updated)
        })
    }

    /// Soft-deletes a transaction owned by `user_id` and removes its shares.
    pub async fn delete_transaction(&self, transaction_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let current = find_live(&db_tx, transaction_id).await?;
            if current.user_id != user_id {
                return Err(EngineError::Forbidden(
                    "transaction belongs to another user".to_string(),
                ));
            }

            transaction_shares::Entity::delete_many()
                .filter(transaction_shares::Column::TransactionId.eq(current.id.to_string()))
                .exec(&db_tx)
                .await?;

            let now = Utc::now();
            let active = transactions::ActiveModel {
                id: ActiveValue::Set(current.id.to_string()),
                deleted_at: ActiveValue::Set(Some(now)),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            tracing::debug!(transaction_id = %current.id, "transaction deleted");
            Ok(())
        })
    }
}
