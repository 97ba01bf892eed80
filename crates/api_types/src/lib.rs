//! Request and response bodies of the `/api/v1` REST surface.
//!
//! Amounts travel as signed integers of minor units (`*_minor`), percentages
//! as decimal strings with two fractional digits (`"50.00"`).

use serde::{Deserialize, Deserializer, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A page of results.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
}

/// Keyword search and pagination, shared by the list endpoints.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListParams {
    pub keyword: Option<String>,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub mod user {
    use chrono::{DateTime, Utc};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: String,
        pub name: String,
        pub email: String,
        pub telegram_id: Option<i64>,
        pub created_at: DateTime<Utc>,
    }

    /// Links a chat identity to the account registered with `email`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TelegramLink {
        pub email: String,
        pub telegram_id: i64,
    }
}

pub mod transaction {
    use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionType {
        Income,
        Expense,
    }

    /// How a new amount is divided between the owner (first) and the
    /// counterpart (second).
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "mode", rename_all = "snake_case")]
    pub enum SplitSpec {
        None,
        /// Percentages such as `"60"` or `"60.00%"`.
        Percentages { values: Vec<String> },
        Amounts { values_minor: Vec<i64> },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareView {
        pub user_id: String,
        /// Display name of the share holder, when known.
        pub user_name: Option<String>,
        pub percentage: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub user_id: String,
        pub transaction_type: TransactionType,
        pub category: String,
        pub description: String,
        pub amount_minor: i64,
        pub spent_at: DateTime<Utc>,
        pub is_shared: bool,
        pub shares: Vec<ShareView>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub transaction_type: TransactionType,
        pub amount_minor: i64,
        /// RFC3339 timestamp; the server uses now() when absent.
        pub spent_at: Option<DateTime<FixedOffset>>,
        pub description: Option<String>,
        pub category: Option<String>,
        pub split: Option<SplitSpec>,
        /// Other party of the split; defaults to the account's counterpart.
        pub counterpart_id: Option<String>,
    }

    /// Partial update: absent fields keep their stored value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionUpdate {
        pub transaction_type: Option<TransactionType>,
        pub amount_minor: Option<i64>,
        pub spent_at: Option<DateTime<FixedOffset>>,
        pub description: Option<String>,
        pub category: Option<String>,
        pub split: Option<SplitSpec>,
        pub counterpart_id: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionListParams {
        pub keyword: Option<String>,
        pub page: Option<u64>,
        pub size: Option<u64>,
        /// Comma separated fields, `-` prefix for descending
        /// (e.g. `-spent_at,amount`).
        pub sort: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecognizeRequest {
        pub text: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SummaryParams {
        pub start_date: Option<NaiveDate>,
        pub end_date: Option<NaiveDate>,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SplitTotalsView {
        pub me_minor: i64,
        pub shared_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SummaryView {
        pub start_date: NaiveDate,
        pub end_date: NaiveDate,
        pub user_id: String,
        pub counterpart_id: Option<String>,
        pub total_income_minor: i64,
        pub total_expense_minor: i64,
        pub counterpart_expense_minor: i64,
        pub total_splited: SplitTotalsView,
        pub counterpart_splited: SplitTotalsView,
    }
}

pub mod scope {
    use chrono::{DateTime, NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RenewalPeriod {
        Weekly,
        Monthly,
        Yearly,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScopeNew {
        pub name: String,
        pub amount_minor: i64,
        pub start_date: Option<NaiveDate>,
        pub end_date: Option<NaiveDate>,
        #[serde(default)]
        pub auto_renew: bool,
        pub renewal_period: Option<RenewalPeriod>,
        #[serde(default)]
        pub categories: Vec<String>,
    }

    /// Partial update. Dates and the renewal period accept `null` to clear
    /// the stored value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ScopeUpdate {
        pub name: Option<String>,
        pub amount_minor: Option<i64>,
        #[serde(default, deserialize_with = "double_option")]
        pub start_date: Option<Option<NaiveDate>>,
        #[serde(default, deserialize_with = "double_option")]
        pub end_date: Option<Option<NaiveDate>>,
        pub auto_renew: Option<bool>,
        #[serde(default, deserialize_with = "double_option")]
        pub renewal_period: Option<Option<RenewalPeriod>>,
        /// Replaces the whole category set when present.
        pub categories: Option<Vec<String>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScopeView {
        pub id: Uuid,
        pub name: String,
        pub amount_minor: i64,
        pub start_date: Option<NaiveDate>,
        pub end_date: Option<NaiveDate>,
        pub auto_renew: bool,
        pub renewal_period: Option<RenewalPeriod>,
        pub categories: Vec<String>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScopeOverviewView {
        #[serde(flatten)]
        pub scope: ScopeView,
        pub total_amount_transaction_minor: i64,
        pub leftout_minor: i64,
        /// Spent share of the ceiling, e.g. `"62.50"`; may exceed 100.
        pub progress: String,
    }
}

pub mod wallet {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletNew {
        pub name: String,
        /// Opening balance; recorded as an income transaction when > 0.
        #[serde(default)]
        pub balance_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletRename {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletView {
        pub id: Uuid,
        pub name: String,
        pub balance_minor: i64,
        pub created_at: DateTime<Utc>,
    }
}

#[cfg(test)]
mod tests {
    use super::scope::{RenewalPeriod, ScopeUpdate};
    use super::transaction::SplitSpec;

    #[test]
    fn scope_update_tells_null_from_missing() {
        let update: ScopeUpdate =
            serde_json::from_str(r#"{"end_date": null, "renewal_period": "weekly"}"#).unwrap();
        assert_eq!(update.start_date, None);
        assert_eq!(update.end_date, Some(None));
        assert_eq!(update.renewal_period, Some(Some(RenewalPeriod::Weekly)));
    }

    #[test]
    fn split_spec_is_tagged_by_mode() {
        let split: SplitSpec =
            serde_json::from_str(r#"{"mode": "percentages", "values": ["60", "40"]}"#).unwrap();
        assert_eq!(
            split,
            SplitSpec::Percentages {
                values: vec!["60".to_string(), "40".to_string()]
            }
        );
        let none: SplitSpec = serde_json::from_str(r#"{"mode": "none"}"#).unwrap();
        assert_eq!(none, SplitSpec::None);
    }
}
