//! Expense-sharing and summary engine.
//!
//! The [`Engine`] owns the database connection and exposes every operation:
//! users, wallets, transactions with their two-party shares, free-text
//! recognition, scopes (budgets) and period summaries.

pub use commands::{
    ListQuery, NewScopeCmd, NewTransactionCmd, Page, ScopePatch, SortField, SortKey,
    TransactionPatch, TransactionQuery, parse_sort,
};
pub use error::EngineError;
pub use money::{Money, Percent};
pub use ops::{Engine, EngineBuilder, PeriodSummary, SplitTotals, TransactionPage};
pub use recognizer::{Recognizer, parse_recognized, system_prompt};
pub use scopes::{RenewalPeriod, Scope, ScopeOverview};
pub use shares::{Split, allocate, reallocate};
pub use transaction_shares::TransactionShare;
pub use transactions::{Transaction, TransactionType};
pub use users::User;
pub use wallets::Wallet;

mod commands;
mod error;
mod money;
mod ops;
mod recognizer;
mod scope_categories;
mod scopes;
mod shares;
mod transaction_shares;
mod transactions;
mod users;
mod util;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
