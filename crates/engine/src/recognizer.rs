//! Free-text recognition.
//!
//! The engine does not talk to a language model itself. A [`Recognizer`]
//! receives a system instruction and the user's message and answers with
//! whatever text the model produced; this module builds the instruction and
//! turns the answer into a [`NewTransactionCmd`].

use std::error::Error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    EngineError, Money, NewTransactionCmd, Percent, ResultEngine, Split, TransactionType, util,
};

/// Sentinel the model uses for the acting user.
const SELF_SENTINEL: &str = "self";

/// External "text in, JSON out" collaborator.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Returns the raw model answer for `text` under `system_prompt`.
    async fn recognize(
        &self,
        system_prompt: &str,
        text: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Builds the system instruction for a message written by `me`.
///
/// `counterpart` is the other party of shared expenses; without one the model
/// is told never to share.
pub fn system_prompt(me: &str, counterpart: Option<&str>) -> String {
    let sharing = match counterpart {
        Some(other) => format!(
            "If the message lists two people with amounts, as in \"(name <amount>, name <amount>)\", \
             set is_shared to true. The first person is the sender, user id \"{me}\". \
             The second person is user id \"{other}\".\n\
             A value ending in % is a percentage: derive each share amount from the transaction \
             amount. For example \"makan ayam 50000 (shelly 50%, blessy 50%)\" gives 25000 to each.\n\
             Without %, the values are exact amounts: derive each percentage from the amount. \
             For example \"belanja 100000 (shelly 30000, blessy 70000)\" gives 30.00 and 70.00."
        ),
        None => "Always set is_shared to false and return an empty transaction_shares array."
            .to_string(),
    };

    format!(
        "You are a finance message parser. Given a short message such as \"makan ayam 50000\" \
         or \"uang freelance 200000\", answer with one JSON object of this shape:\n\
         {{\n\
         \x20 \"description\": string,       // short description\n\
         \x20 \"amount\": number,            // total amount in IDR\n\
         \x20 \"transaction_type\": \"expense\",\n\
         \x20 \"wallet_name\": string,       // \"default\" when not mentioned\n\
         \x20 \"user_id\": string,           // \"{SELF_SENTINEL}\" when not mentioned\n\
         \x20 \"is_shared\": boolean,\n\
         \x20 \"category\": string,          // inferred from the description\n\
         \x20 \"spent_at\": string,          // RFC 3339, omit when not mentioned\n\
         \x20 \"transaction_shares\": [ {{ \"user_id\": string, \"percentage\": number, \"amount\": number }} ]\n\
         }}\n\
         {sharing}\n\
         Assume the transaction is always an expense.\n\
         Only answer with the JSON object. No explanation, no extra text."
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecognizedTransaction {
    description: Option<String>,
    amount: Option<Value>,
    is_shared: Option<bool>,
    category: Option<String>,
    spent_at: Option<String>,
    user_id: Option<String>,
    transaction_shares: Vec<RecognizedShare>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecognizedShare {
    user_id: Option<String>,
    percentage: Option<Value>,
    amount: Option<Value>,
}

/// Removes a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn lenient_money(value: &Value) -> Option<Money> {
    match value {
        Value::Number(number) => {
            if let Some(units) = number.as_i64() {
                return Money::from_units(units);
            }
            let float = number.as_f64()?;
            format!("{float:.2}").parse().ok()
        }
        Value::String(raw) => {
            let cleaned = raw.trim().trim_start_matches("Rp").trim();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

fn lenient_percent(value: &Value) -> Option<Percent> {
    match value {
        Value::Number(number) => number.to_string().parse().ok(),
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}

fn failed(reason: impl Into<String>) -> EngineError {
    EngineError::RecognitionFailed(reason.into())
}

/// Turns a model answer into a command for `me`.
///
/// `text` is the original message; a `%` in it selects a percentage split.
/// Defaults: missing description -> the message itself, missing category ->
/// inferred from the description, missing or unreadable `spent_at` -> `now`.
/// The type is always [`TransactionType::Expense`].
pub fn parse_recognized(
    content: &str,
    text: &str,
    me: &str,
    counterpart: Option<&str>,
    now: DateTime<Utc>,
) -> ResultEngine<NewTransactionCmd> {
    let recognized: RecognizedTransaction = serde_json::from_str(strip_code_fence(content))
        .map_err(|err| failed(format!("unparsable recognizer output: {err}")))?;

    if let Some(owner) = recognized.user_id.as_deref()
        && owner != SELF_SENTINEL
        && owner != me
    {
        tracing::debug!(owner, "recognizer named another owner; using the sender");
    }

    let description = recognized
        .description
        .as_deref()
        .and_then(|d| util::normalize_optional_text(Some(d)))
        .unwrap_or_else(|| text.trim().to_string());

    let shares = ordered_shares(recognized.transaction_shares, counterpart);
    let share_amounts: Option<Vec<Money>> = shares
        .iter()
        .map(|s| s.amount.as_ref().and_then(lenient_money))
        .collect();
    let share_percentages: Option<Vec<Percent>> = shares
        .iter()
        .map(|s| s.percentage.as_ref().and_then(lenient_percent))
        .collect();

    let amount = match recognized.amount.as_ref() {
        Some(value) => lenient_money(value).ok_or_else(|| failed("unreadable amount"))?,
        None => share_amounts
            .as_ref()
            .filter(|amounts| !amounts.is_empty())
            .map(|amounts| amounts.iter().copied().sum())
            .ok_or_else(|| failed("missing amount"))?,
    };
    if !amount.is_positive() {
        return Err(failed("amount must be > 0"));
    }

    let wants_share = recognized.is_shared.unwrap_or(false) || !shares.is_empty();
    let split = if !wants_share || shares.is_empty() {
        Split::Unshared
    } else if counterpart.is_none() {
        tracing::warn!("shared expense recognised without a counterpart; recording as personal");
        Split::Unshared
    } else if text.contains('%')
        && let Some(percentages) = share_percentages
    {
        Split::Percentages(percentages)
    } else if let Some(amounts) = share_amounts {
        Split::Amounts(amounts)
    } else if let Some(percentages) = share_percentages {
        Split::Percentages(percentages)
    } else {
        return Err(failed("shares carry neither amounts nor percentages"));
    };

    let category = recognized
        .category
        .as_deref()
        .and_then(|c| util::normalize_optional_text(Some(c)))
        .unwrap_or_else(|| util::infer_category(&description));

    let spent_at = recognized
        .spent_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map_or(now, |at| at.with_timezone(&Utc));

    let mut cmd = NewTransactionCmd::new(me, TransactionType::Expense, amount, spent_at)
        .description(description)
        .category(category)
        .split(split);
    if let Some(other) = counterpart {
        cmd = cmd.counterpart(other);
    }
    Ok(cmd)
}

/// Puts the sender's share first when the model listed the counterpart first.
fn ordered_shares(mut shares: Vec<RecognizedShare>, counterpart: Option<&str>) -> Vec<RecognizedShare> {
    if shares.len() == 2
        && counterpart.is_some()
        && shares[0].user_id.as_deref() == counterpart
        && shares[1].user_id.as_deref() != counterpart
    {
        shares.swap(0, 1);
    }
    shares
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn prompt_embeds_both_identities() {
        let prompt = system_prompt("user-a", Some("user-b"));
        assert!(prompt.contains("\"user-a\""));
        assert!(prompt.contains("\"user-b\""));
        assert!(prompt.contains("always an expense"));

        let alone = system_prompt("user-a", None);
        assert!(alone.contains("is_shared to false"));
    }

    #[test]
    fn plain_expense_gets_defaults() {
        let cmd = parse_recognized(
            r#"{"description": "Makan ayam", "amount": 50000}"#,
            "makan ayam 50000",
            "me",
            Some("you"),
            now(),
        )
        .unwrap();
        assert_eq!(cmd.amount, Money::new(5_000_000));
        assert_eq!(cmd.transaction_type, TransactionType::Expense);
        assert_eq!(cmd.category.as_deref(), Some("makan"));
        assert_eq!(cmd.spent_at, now());
        assert_eq!(cmd.split, Split::Unshared);
    }

    #[test]
    fn percentage_message_selects_percentage_split() {
        let content = r#"```json
{
  "description": "makan ayam",
  "amount": 50000,
  "transaction_type": "INCOME",
  "is_shared": true,
  "category": "food",
  "transaction_shares": [
    {"user_id": "me", "percentage": 50, "amount": 25000},
    {"user_id": "you", "percentage": 50, "amount": 25000}
  ]
}
```"#;
        let cmd = parse_recognized(
            content,
            "makan ayam 50000 (shelly 50%, blessy 50%)",
            "me",
            Some("you"),
            now(),
        )
        .unwrap();
        assert_eq!(cmd.transaction_type, TransactionType::Expense);
        assert_eq!(
            cmd.split,
            Split::Percentages(vec![Percent::new(5_000), Percent::new(5_000)])
        );
        assert_eq!(cmd.counterpart.as_deref(), Some("you"));
    }

    #[test]
    fn absolute_message_selects_amount_split() {
        let content = r#"{
  "description": "belanja",
  "amount": 100000,
  "is_shared": true,
  "transaction_shares": [
    {"user_id": "you", "percentage": 70, "amount": 70000},
    {"user_id": "self", "percentage": 30, "amount": 30000}
  ]
}"#;
        let cmd = parse_recognized(
            content,
            "belanja 100000 (shelly 30000, blessy 70000)",
            "me",
            Some("you"),
            now(),
        )
        .unwrap();
        assert_eq!(
            cmd.split,
            Split::Amounts(vec![Money::new(3_000_000), Money::new(7_000_000)])
        );
    }

    #[test]
    fn shared_without_counterpart_is_personal() {
        let content = r#"{"amount": 20000, "is_shared": true,
            "transaction_shares": [{"amount": 10000}, {"amount": 10000}]}"#;
        let cmd = parse_recognized(content, "bensin 20000", "me", None, now()).unwrap();
        assert_eq!(cmd.split, Split::Unshared);
        assert_eq!(cmd.description.as_deref(), Some("bensin 20000"));
    }

    #[test]
    fn explicit_spent_at_is_kept() {
        let cmd = parse_recognized(
            r#"{"amount": 1000, "spent_at": "2025-05-30T08:00:00+07:00"}"#,
            "kopi 1000 kemarin",
            "me",
            None,
            now(),
        )
        .unwrap();
        assert_eq!(cmd.spent_at, Utc.with_ymd_and_hms(2025, 5, 30, 1, 0, 0).unwrap());
    }

    #[test]
    fn unparsable_output_fails_recognition() {
        for content in ["Sorry, I cannot help", "{\"amount\": \"lots\"}", "{}", "[1, 2]"] {
            let err = parse_recognized(content, "???", "me", Some("you"), now()).unwrap_err();
            assert!(matches!(err, EngineError::RecognitionFailed(_)), "{content}");
        }
    }

    #[test]
    fn code_fence_is_stripped() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
    }
}
