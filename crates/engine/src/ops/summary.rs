//! Period summaries: income and expense totals of a user over a date range,
//! and how their shared expenses (and the counterpart's) were split.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use sea_orm::{ConnectionTrait, JoinType, QueryFilter, QuerySelect, RelationTrait, prelude::*, sea_query::Expr};

use crate::{EngineError, Money, ResultEngine, TransactionType, transaction_shares, transactions};

use super::{Engine, users::find_counterpart};

/// How the shared expenses of one transaction owner were split.
///
/// `me` is the part carried by the owner of the transactions, `shared` the
/// part carried by the other party.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitTotals {
    pub me: Money,
    pub shared: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Owner of the summary.
    pub user_id: String,
    pub counterpart_id: Option<String>,
    pub total_income: Money,
    pub total_expense: Money,
    pub counterpart_expense: Money,
    /// Split of the user's own shared expenses.
    pub total_splited: SplitTotals,
    /// Split of the counterpart's shared expenses.
    pub counterpart_splited: SplitTotals,
}

/// First and last day of the month containing `date`.
fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(first);
    (first, last)
}

/// `[start 00:00, end + 1 day 00:00)` in UTC.
fn day_range(start: NaiveDate, end: NaiveDate) -> ResultEngine<(DateTime<Utc>, DateTime<Utc>)> {
    if start > end {
        return Err(EngineError::InvalidInput(
            "invalid range: start_date must not be after end_date".to_string(),
        ));
    }
    let after_end = end
        .succ_opt()
        .ok_or_else(|| EngineError::InvalidInput("end_date out of range".to_string()))?;
    Ok((
        start.and_time(NaiveTime::MIN).and_utc(),
        after_end.and_time(NaiveTime::MIN).and_utc(),
    ))
}

async fn type_total<C>(
    db: &C,
    user_id: &str,
    kind: TransactionType,
    (from, to): (DateTime<Utc>, DateTime<Utc>),
) -> ResultEngine<Money>
where
    C: ConnectionTrait,
{
    let total: Option<Option<i64>> = transactions::Entity::find()
        .select_only()
        .column_as(Expr::col(transactions::Column::AmountMinor).sum(), "total")
        .filter(transactions::Column::UserId.eq(user_id))
        .filter(transactions::Column::TransactionType.eq(kind.as_str()))
        .filter(transactions::Column::DeletedAt.is_null())
        .filter(transactions::Column::SpentAt.gte(from))
        .filter(transactions::Column::SpentAt.lt(to))
        .into_tuple()
        .one(db)
        .await?;
    Ok(Money::new(total.flatten().unwrap_or(0)))
}

/// Sum of the shares on `owner`'s shared expenses, either the ones `owner`
/// carries (`owned = true`) or the other party's.
async fn share_total<C>(
    db: &C,
    owner: &str,
    owned: bool,
    (from, to): (DateTime<Utc>, DateTime<Utc>),
) -> ResultEngine<Money>
where
    C: ConnectionTrait,
{
    let share_owner = if owned {
        transaction_shares::Column::UserId.eq(owner)
    } else {
        transaction_shares::Column::UserId.ne(owner)
    };
    let total: Option<Option<i64>> = transaction_shares::Entity::find()
        .select_only()
        .column_as(
            Expr::col((
                transaction_shares::Entity,
                transaction_shares::Column::AmountMinor,
            ))
            .sum(),
            "total",
        )
        .join(
            JoinType::InnerJoin,
            transaction_shares::Relation::Transaction.def(),
        )
        .filter(transactions::Column::UserId.eq(owner))
        .filter(transactions::Column::IsShared.eq(true))
        .filter(transactions::Column::TransactionType.eq(TransactionType::Expense.as_str()))
        .filter(transactions::Column::DeletedAt.is_null())
        .filter(transactions::Column::SpentAt.gte(from))
        .filter(transactions::Column::SpentAt.lt(to))
        .filter(share_owner)
        .into_tuple()
        .one(db)
        .await?;
    Ok(Money::new(total.flatten().unwrap_or(0)))
}

async fn split_totals<C>(
    db: &C,
    owner: &str,
    range: (DateTime<Utc>, DateTime<Utc>),
) -> ResultEngine<SplitTotals>
where
    C: ConnectionTrait,
{
    Ok(SplitTotals {
        me: share_total(db, owner, true, range).await?,
        shared: share_total(db, owner, false, range).await?,
    })
}

impl Engine {
    /// Summary of `user_id`'s transactions between `start_date` and
    /// `end_date`, both inclusive. Missing dates default to the current month.
    pub async fn period_summary(
        &self,
        user_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> ResultEngine<PeriodSummary> {
        let (month_start, month_end) = month_bounds(Utc::now().date_naive());
        let start_date = start_date.unwrap_or(month_start);
        let end_date = end_date.unwrap_or(month_end);
        let range = day_range(start_date, end_date)?;

        let db = &self.database;
        let counterpart = find_counterpart(db, user_id).await?;

        let total_income = type_total(db, user_id, TransactionType::Income, range).await?;
        let total_expense = type_total(db, user_id, TransactionType::Expense, range).await?;
        let total_splited = split_totals(db, user_id, range).await?;

        let (counterpart_expense, counterpart_splited) = match &counterpart {
            Some(other) => (
                type_total(db, &other.id, TransactionType::Expense, range).await?,
                split_totals(db, &other.id, range).await?,
            ),
            None => (Money::ZERO, SplitTotals::default()),
        };

        Ok(PeriodSummary {
            start_date,
            end_date,
            user_id: user_id.to_string(),
            counterpart_id: counterpart.map(|user| user.id),
            total_income,
            total_expense,
            counterpart_expense,
            total_splited,
            counterpart_splited,
        })
    }
}
