use chrono::Utc;
use uuid::Uuid;

use sea_orm::{
    ActiveValue, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    EngineError, ListQuery, Money, NewTransactionCmd, Page, ResultEngine, TransactionType, Wallet,
    util::normalize_required_text, wallets,
};

use super::{
    Engine, keyword_condition,
    transactions::{build_transaction, insert_transaction},
    with_tx,
};

/// Category of the transaction recording a wallet's opening balance.
const OPENING_CATEGORY: &str = "opname";

async fn require_wallet<C>(db: &C, wallet_id: Uuid, user_id: &str) -> ResultEngine<wallets::Model>
where
    C: ConnectionTrait,
{
    let model = wallets::Entity::find_by_id(wallet_id.to_string())
        .filter(wallets::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("wallet not exists".to_string()))?;
    if model.user_id != user_id {
        return Err(EngineError::Forbidden(
            "wallet belongs to another user".to_string(),
        ));
    }
    Ok(model)
}

async fn ensure_unique_name<C>(
    db: &C,
    user_id: &str,
    name: &str,
    except: Option<Uuid>,
) -> ResultEngine<()>
where
    C: ConnectionTrait,
{
    let mut query = wallets::Entity::find()
        .filter(wallets::Column::UserId.eq(user_id))
        .filter(wallets::Column::DeletedAt.is_null())
        .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()));
    if let Some(wallet_id) = except {
        query = query.filter(wallets::Column::Id.ne(wallet_id.to_string()));
    }
    if query.one(db).await?.is_some() {
        return Err(EngineError::ExistingKey(name.to_string()));
    }
    Ok(())
}

impl Engine {
    /// Return a wallet owned by `user_id`.
    pub async fn wallet(&self, wallet_id: Uuid, user_id: &str) -> ResultEngine<Wallet> {
        let model = require_wallet(&self.database, wallet_id, user_id).await?;
        Wallet::try_from(model)
    }

    /// Lists the live wallets of `user_id`, oldest first.
    pub async fn wallets(&self, user_id: &str, query: &ListQuery) -> ResultEngine<Page<Wallet>> {
        let page = query.page_number();
        let size = query.page_size();
        let offset = query.offset()?;

        let mut select = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::DeletedAt.is_null());
        if let Some(condition) =
            keyword_condition(&[wallets::Column::Name], query.keyword.as_deref())
        {
            select = select.filter(condition);
        }

        let total = select.clone().count(&self.database).await?;
        let items = select
            .order_by_asc(wallets::Column::CreatedAt)
            .order_by_asc(wallets::Column::Id)
            .offset(offset)
            .limit(size)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Wallet::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page,
            size,
        })
    }

    /// Add a new wallet.
    ///
    /// A positive `balance` is also recorded as an `Initial balance` income
    /// transaction, in the same DB transaction as the wallet itself.
    pub async fn new_wallet(&self, user_id: &str, name: &str, balance: Money) -> ResultEngine<Wallet> {
        let name = normalize_required_text(name, "wallet name")?;
        if balance.is_negative() {
            return Err(EngineError::InvalidAmount(
                "wallet balance must be >= 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            ensure_unique_name(&db_tx, user_id, &name, None).await?;

            let wallet = Wallet::new(user_id.to_string(), name, balance);
            let model: wallets::ActiveModel = (&wallet).into();
            model.insert(&db_tx).await?;

            if balance.is_positive() {
                let cmd = NewTransactionCmd::new(user_id, TransactionType::Income, balance, Utc::now())
                    .category(OPENING_CATEGORY)
                    .description("Initial balance");
                let tx = build_transaction(cmd, None)?;
                insert_transaction(&db_tx, &tx).await?;
            }

            tracing::info!(wallet_id = %wallet.id, "wallet created");
            Ok(wallet)
        })
    }

    /// Renames a wallet owned by `user_id`.
    pub async fn rename_wallet(
        &self,
        wallet_id: Uuid,
        user_id: &str,
        new_name: &str,
    ) -> ResultEngine<Wallet> {
        let new_name = normalize_required_text(new_name, "wallet name")?;
        with_tx!(self, |db_tx| {
            let model = require_wallet(&db_tx, wallet_id, user_id).await?;
            ensure_unique_name(&db_tx, user_id, &new_name, Some(wallet_id)).await?;

            let mut active: wallets::ActiveModel = model.into();
            active.name = ActiveValue::Set(new_name);
            let model = active.update(&db_tx).await?;
            Wallet::try_from(model)
        })
    }

    /// Soft-deletes a wallet owned by `user_id`.
    pub async fn delete_wallet(&self, wallet_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_wallet(&db_tx, wallet_id, user_id).await?;

            let active = wallets::ActiveModel {
                id: ActiveValue::Set(wallet_id.to_string()),
                deleted_at: ActiveValue::Set(Some(Utc::now())),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }
}
