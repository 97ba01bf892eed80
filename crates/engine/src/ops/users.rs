use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, User, users, util::normalize_required_text};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a user. Emails are unique, compared case-insensitively.
    pub async fn new_user(&self, name: &str, email: &str, password: &str) -> ResultEngine<User> {
        let name = normalize_required_text(name, "user name")?;
        let email = normalize_required_text(email, "email")?.to_lowercase();
        if password.is_empty() {
            return Err(EngineError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let exists = users::Entity::find()
                .filter(Expr::cust("LOWER(email)").eq(email.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(email));
            }

            let model = users::ActiveModel {
                id: ActiveValue::Set(Uuid::now_v7().to_string()),
                name: ActiveValue::Set(name),
                email: ActiveValue::Set(email),
                password: ActiveValue::Set(password.to_string()),
                telegram_id: ActiveValue::Set(None),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Ok(User::from(model))
        })
    }

    /// All users, oldest first.
    pub async fn users(&self) -> ResultEngine<Vec<User>> {
        let models = users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(User::from).collect())
    }

    /// The users among `ids` that exist, oldest first. Unknown ids are skipped.
    pub async fn users_by_ids(&self, ids: &[String]) -> ResultEngine<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.iter().cloned()))
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(User::from).collect())
    }

    pub async fn user(&self, user_id: &str) -> ResultEngine<User> {
        users::Entity::find_by_id(user_id.to_string())
            .one(&self.database)
            .await?
            .map(User::from)
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    pub async fn user_by_email(&self, email: &str) -> ResultEngine<User> {
        users::Entity::find()
            .filter(Expr::cust("LOWER(email)").eq(email.trim().to_lowercase()))
            .one(&self.database)
            .await?
            .map(User::from)
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    /// Checks `email` and `password`. Returns `None` on mismatch.
    pub async fn authenticate(&self, email: &str, password: &str) -> ResultEngine<Option<User>> {
        if email.trim().is_empty() || password.is_empty() {
            return Ok(None);
        }
        let model = users::Entity::find()
            .filter(Expr::cust("LOWER(email)").eq(email.trim().to_lowercase()))
            .filter(users::Column::Password.eq(password))
            .one(&self.database)
            .await?;
        Ok(model.map(User::from))
    }

    pub async fn user_by_telegram_id(&self, telegram_id: i64) -> ResultEngine<Option<User>> {
        let model = users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .one(&self.database)
            .await?;
        Ok(model.map(User::from))
    }

    /// Binds a chat identity to the user owning `email`.
    ///
    /// The identity is moved away from any other user first, so it stays
    /// unique.
    pub async fn link_telegram(&self, email: &str, telegram_id: i64) -> ResultEngine<User> {
        let email = email.trim().to_lowercase();
        with_tx!(self, |db_tx| {
            let model = users::Entity::find()
                .filter(Expr::cust("LOWER(email)").eq(email.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(email.clone()))?;

            users::Entity::update_many()
                .col_expr(users::Column::TelegramId, Expr::value(Option::<i64>::None))
                .filter(users::Column::TelegramId.eq(telegram_id))
                .filter(users::Column::Id.ne(model.id.clone()))
                .exec(&db_tx)
                .await?;

            let mut active: users::ActiveModel = model.into();
            active.telegram_id = ActiveValue::Set(Some(telegram_id));
            let model = active.update(&db_tx).await?;
            tracing::info!(user_id = %model.id, "chat identity linked");
            Ok(User::from(model))
        })
    }

    /// The other party of `user_id`'s shared expenses: the oldest other
    /// user, if any.
    pub async fn counterpart_of(&self, user_id: &str) -> ResultEngine<Option<User>> {
        find_counterpart(&self.database, user_id).await
    }
}

pub(super) async fn find_counterpart<C>(db: &C, user_id: &str) -> ResultEngine<Option<User>>
where
    C: ConnectionTrait,
{
    let model = users::Entity::find()
        .filter(users::Column::Id.ne(user_id))
        .order_by_asc(users::Column::CreatedAt)
        .order_by_asc(users::Column::Id)
        .one(db)
        .await?;
    Ok(model.map(User::from))
}
