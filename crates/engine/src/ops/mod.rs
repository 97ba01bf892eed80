use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection,
    sea_query::{Expr, Func},
};

use crate::ResultEngine;

mod recognition;
mod scopes;
mod summary;
mod transactions;
mod users;
mod wallets;

pub use summary::{PeriodSummary, SplitTotals};
pub use transactions::TransactionPage;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// Case-insensitive substring match of `keyword` on any of `columns`.
/// Blank keywords match everything and yield `None`.
fn keyword_condition<C>(columns: &[C], keyword: Option<&str>) -> Option<Condition>
where
    C: ColumnTrait + 'static,
{
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty())?;
    let pattern = format!("%{}%", keyword.to_lowercase());
    let condition = columns.iter().fold(Condition::any(), |condition, column| {
        condition.add(Expr::expr(Func::lower(Expr::col(*column))).like(pattern.clone()))
    });
    Some(condition)
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
