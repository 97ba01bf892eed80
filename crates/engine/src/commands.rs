//! Command structs for engine operations.
//!
//! These types group parameters for write operations and list queries,
//! keeping call sites readable and avoiding long argument lists.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{EngineError, Money, RenewalPeriod, ResultEngine, Split, TransactionType};

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Create a transaction through the API path.
#[derive(Clone, Debug)]
pub struct NewTransactionCmd {
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub spent_at: DateTime<Utc>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub split: Split,
    /// Second party of a shared split. Resolved with
    /// [`Engine::counterpart_of`](crate::Engine::counterpart_of) when absent.
    pub counterpart: Option<String>,
}

impl NewTransactionCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        transaction_type: TransactionType,
        amount: Money,
        spent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_type,
            amount,
            spent_at,
            description: None,
            category: None,
            split: Split::Unshared,
            counterpart: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    #[must_use]
    pub fn counterpart(mut self, counterpart: impl Into<String>) -> Self {
        self.counterpart = Some(counterpart.into());
        self
    }
}

/// Partial update of a transaction. `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct TransactionPatch {
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<Money>,
    pub spent_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Replaces the shares. `Some(Split::Unshared)` drops them.
    pub split: Option<Split>,
    pub counterpart: Option<String>,
}

impl TransactionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn spent_at(mut self, spent_at: DateTime<Utc>) -> Self {
        self.spent_at = Some(spent_at);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn split(mut self, split: Split) -> Self {
        self.split = Some(split);
        self
    }

    #[must_use]
    pub fn counterpart(mut self, counterpart: impl Into<String>) -> Self {
        self.counterpart = Some(counterpart.into());
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.transaction_type.is_none()
            && self.amount.is_none()
            && self.spent_at.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.split.is_none()
    }
}

/// Create a scope (budget).
#[derive(Clone, Debug)]
pub struct NewScopeCmd {
    pub user_id: String,
    pub name: String,
    pub amount: Money,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub auto_renew: bool,
    pub renewal_period: Option<RenewalPeriod>,
    pub categories: Vec<String>,
}

impl NewScopeCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, amount: Money) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            amount,
            start_date: None,
            end_date: None,
            auto_renew: false,
            renewal_period: None,
            categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn period(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn renew(mut self, period: RenewalPeriod) -> Self {
        self.auto_renew = true;
        self.renewal_period = Some(period);
        self
    }

    #[must_use]
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update of a scope. `None` fields are left untouched.
///
/// Dates use a double `Option`: `Some(None)` clears the date.
#[derive(Clone, Debug, Default)]
pub struct ScopePatch {
    pub name: Option<String>,
    pub amount: Option<Money>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub auto_renew: Option<bool>,
    pub renewal_period: Option<Option<RenewalPeriod>>,
    /// Replaces the whole category set.
    pub categories: Option<Vec<String>>,
}

impl ScopePatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}

/// Keyword filter and pagination shared by list operations.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    /// Case-insensitive substring filter.
    pub keyword: Option<String>,
    /// 1-based page number; `0` and `None` mean the first page.
    pub page: Option<u64>,
    /// Page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub size: Option<u64>,
}

impl ListQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    #[must_use]
    pub fn page(mut self, page: u64, size: u64) -> Self {
        self.page = Some(page);
        self.size = Some(size);
        self
    }

    pub(crate) fn page_number(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub(crate) fn page_size(&self) -> u64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip before the requested page.
    pub(crate) fn offset(&self) -> ResultEngine<u64> {
        (self.page_number() - 1)
            .checked_mul(self.page_size())
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| EngineError::InvalidInput("page out of range".to_string()))
    }
}

/// Sortable transaction columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    SpentAt,
    Amount,
    Category,
    Description,
}

impl TryFrom<&str> for SortField {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "created_at" => Ok(Self::CreatedAt),
            "spent_at" => Ok(Self::SpentAt),
            "amount" => Ok(Self::Amount),
            "category" => Ok(Self::Category),
            "description" => Ok(Self::Description),
            other => Err(EngineError::InvalidInput(format!(
                "cannot sort by '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

/// Parses `"-spent_at,amount"` into sort keys. A leading `-` means
/// descending. Blank input yields no keys.
pub fn parse_sort(raw: &str) -> ResultEngine<Vec<SortKey>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (descending, name) = match part.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, part.strip_prefix('+').unwrap_or(part)),
            };
            Ok(SortKey {
                field: SortField::try_from(name.trim())?,
                descending,
            })
        })
        .collect()
}

/// Transaction list query.
#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    pub list: ListQuery,
    /// Empty means `created_at` descending.
    pub sort: Vec<SortKey>,
}

impl TransactionQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.list = self.list.keyword(keyword);
        self
    }

    #[must_use]
    pub fn page(mut self, page: u64, size: u64) -> Self {
        self.list = self.list.page(page, size);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }
}

/// One page of results plus the unpaginated total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_parses_direction_and_fields() {
        let keys = parse_sort("-spent_at, amount").unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey {
                    field: SortField::SpentAt,
                    descending: true
                },
                SortKey {
                    field: SortField::Amount,
                    descending: false
                },
            ]
        );
        assert!(parse_sort("").unwrap().is_empty());
    }

    #[test]
    fn sort_rejects_unknown_fields() {
        assert!(matches!(
            parse_sort("password"),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        let query = ListQuery::new();
        assert_eq!(query.page_number(), 1);
        assert_eq!(query.page_size(), DEFAULT_PAGE_SIZE);

        let query = ListQuery::new().page(0, 1_000);
        assert_eq!(query.page_number(), 1);
        assert_eq!(query.page_size(), MAX_PAGE_SIZE);
        assert_eq!(ListQuery::new().page(3, 20).offset().unwrap(), 40);
    }

    #[test]
    fn unreachable_page_is_invalid_input() {
        let query = ListQuery::new().page(u64::MAX, 10);
        assert!(matches!(query.offset(), Err(EngineError::InvalidInput(_))));
    }
}
