use sea_orm::{
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, prelude::*,
};

use crate::{Page, ResultEngine, SortField, SortKey, TransactionQuery, transactions};

use super::super::{Engine, keyword_condition};
use super::{TransactionPage, with_shares};

fn sort_column(field: SortField) -> transactions::Column {
    match field {
        SortField::CreatedAt => transactions::Column::CreatedAt,
        SortField::SpentAt => transactions::Column::SpentAt,
        SortField::Amount => transactions::Column::AmountMinor,
        SortField::Category => transactions::Column::Category,
        SortField::Description => transactions::Column::Description,
    }
}

trait ApplyTxSort: QueryOrder + Sized {
    fn apply_tx_sort(self, sort: &[SortKey]) -> Self;
}

impl ApplyTxSort for Select<transactions::Entity> {
    fn apply_tx_sort(mut self, sort: &[SortKey]) -> Self {
        if sort.is_empty() {
            self = self.order_by(transactions::Column::CreatedAt, Order::Desc);
        }
        for key in sort {
            let order = if key.descending { Order::Desc } else { Order::Asc };
            self = self.order_by(sort_column(key.field), order);
        }
        // Ids are time ordered, so equal keys fall back to newest first.
        self.order_by(transactions::Column::Id, Order::Desc)
    }
}

impl Engine {
    /// Lists the live transactions owned by `user_id`.
    ///
    /// The keyword matches description and category, case-insensitively.
    /// Default order is `created_at` descending.
    pub async fn transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> ResultEngine<TransactionPage> {
        let page = query.list.page_number();
        let size = query.list.page_size();
        let offset = query.list.offset()?;

        let mut select = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::DeletedAt.is_null());
        if let Some(condition) = keyword_condition(
            &[
                transactions::Column::Description,
                transactions::Column::Category,
            ],
            query.list.keyword.as_deref(),
        ) {
            select = select.filter(condition);
        }

        let total = select.clone().count(&self.database).await?;
        let models = select
            .apply_tx_sort(&query.sort)
            .offset(offset)
            .limit(size)
            .all(&self.database)
            .await?;
        let items = with_shares(&self.database, models).await?;

        Ok(Page {
            items,
            total,
            page,
            size,
        })
    }
}
