//! Reply formatting. Replies use Telegram's MarkdownV2, so every piece of
//! user-supplied text goes through [`escape_markdown_v2`].

use api_types::transaction::{TransactionType, TransactionView};
use chrono_tz::Tz;
use engine::{Money, Percent};

const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub(crate) fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `Rp50.000`: integer part only, dot as thousands separator.
pub(crate) fn format_rupiah(amount_minor: i64) -> String {
    Money::new(amount_minor).format_rupiah()
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub(crate) fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn type_label(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Income => "income",
        TransactionType::Expense => "expense",
    }
}

pub(crate) fn render_transaction(tx: &TransactionView, tz: Tz) -> String {
    let date = tx.spent_at.with_timezone(&tz).format("%-d %b %Y").to_string();

    let mut text = String::from("✅ *Transaction Recognized*\n\n");
    text.push_str(&format!(
        "*Category:* {}\n",
        escape_markdown_v2(&title_case(&tx.category))
    ));
    text.push_str(&format!(
        "*Type:* {}\n",
        escape_markdown_v2(&title_case(type_label(tx.transaction_type)))
    ));
    text.push_str(&format!(
        "*Description:* {}\n",
        escape_markdown_v2(&tx.description)
    ));
    text.push_str(&format!(
        "*Amount:* {}\n",
        escape_markdown_v2(&format_rupiah(tx.amount_minor))
    ));
    text.push_str(&format!("*Date:* {}\n", escape_markdown_v2(&date)));
    text.push_str(&format!(
        "*Shared:* {}\n",
        if tx.is_shared { "Yes" } else { "No" }
    ));

    if tx.is_shared && !tx.shares.is_empty() {
        text.push_str("\n*Breakdown:*\n");
        for share in &tx.shares {
            let name = escape_markdown_v2(share.user_name.as_deref().unwrap_or(&share.user_id));
            let amount = escape_markdown_v2(&format_rupiah(share.amount_minor));
            let has_percentage = share
                .percentage
                .parse::<Percent>()
                .is_ok_and(|pct| pct > Percent::ZERO);
            if has_percentage {
                text.push_str(&format!(
                    "• {name}: {}% — {amount}\n",
                    escape_markdown_v2(&share.percentage),
                ));
            } else {
                text.push_str(&format!("• {name}: {amount}\n"));
            }
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use api_types::transaction::ShareView;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn view(is_shared: bool) -> TransactionView {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();
        TransactionView {
            id: Default::default(),
            user_id: "alice".to_string(),
            transaction_type: TransactionType::Expense,
            category: "makan malam".to_string(),
            description: "makan ayam (pedas)".to_string(),
            amount_minor: 5_000_000,
            spent_at: at,
            is_shared,
            shares: vec![
                ShareView {
                    user_id: "alice".to_string(),
                    user_name: Some("Shelly".to_string()),
                    percentage: "50.00".to_string(),
                    amount_minor: 2_500_000,
                },
                ShareView {
                    user_id: "bob".to_string(),
                    user_name: None,
                    percentage: "50.00".to_string(),
                    amount_minor: 2_500_000,
                },
            ],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn escapes_every_special_character() {
        assert_eq!(escape_markdown_v2("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown_v2("1.500!"), "1\\.500\\!");
        assert_eq!(escape_markdown_v2("(x)[y]{z}"), "\\(x\\)\\[y\\]\\{z\\}");
        assert_eq!(escape_markdown_v2("~`>#+-=|"), "\\~\\`\\>\\#\\+\\-\\=\\|");
        assert_eq!(escape_markdown_v2("back\\slash"), "back\\\\slash");
        assert_eq!(escape_markdown_v2("plain"), "plain");
    }

    #[test]
    fn formats_rupiah_with_dots() {
        assert_eq!(format_rupiah(5_000_000), "Rp50.000");
        assert_eq!(format_rupiah(50_000), "Rp500");
        assert_eq!(format_rupiah(123_456_789_00), "Rp123.456.789");
    }

    #[test]
    fn title_cases_words() {
        assert_eq!(title_case("makan MALAM"), "Makan Malam");
        assert_eq!(title_case("expense"), "Expense");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn renders_shared_breakdown() {
        let text = render_transaction(&view(true), chrono_tz::Asia::Jakarta);
        assert!(text.contains("*Category:* Makan Malam\n"));
        assert!(text.contains("*Type:* Expense\n"));
        assert!(text.contains("*Description:* makan ayam \\(pedas\\)\n"));
        assert!(text.contains("*Amount:* Rp50\\.000\n"));
        // 20:00 UTC is already the next day in Jakarta.
        assert!(text.contains("*Date:* 2 Jun 2025\n"));
        assert!(text.contains("*Shared:* Yes\n"));
        assert!(text.contains("• Shelly: 50\\.00% — Rp25\\.000\n"));
        assert!(text.contains("• bob: 50\\.00% — Rp25\\.000\n"));
    }

    #[test]
    fn zero_percentage_shows_amount_only() {
        let mut tx = view(true);
        tx.shares[1].percentage = "0.00".to_string();
        let text = render_transaction(&tx, chrono_tz::Asia::Jakarta);
        assert!(text.contains("• bob: Rp25\\.000\n"));
    }

    #[test]
    fn unshared_reply_has_no_breakdown() {
        let text = render_transaction(&view(false), chrono_tz::Asia::Jakarta);
        assert!(text.contains("*Shared:* No\n"));
        assert!(!text.contains("Breakdown"));
    }
}
