//! Share allocation between the two parties of a shared transaction.
//!
//! Party 0 is always the transaction owner and party 1 the counterpart.
//! Whatever the input, the produced share amounts add up to the total to the
//! cent: rounding leftovers are absorbed by the last share.

use uuid::Uuid;

use crate::{EngineError, Money, Percent, ResultEngine, TransactionShare};

/// Parties supported by a split.
const PARTIES: usize = 2;

/// How a transaction amount is divided between owner and counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Split {
    /// Not shared: the owner carries the whole amount and no shares exist.
    Unshared,
    /// `[owner, counterpart]` percentages; amounts are derived.
    Percentages(Vec<Percent>),
    /// `[owner, counterpart]` amounts; percentages are derived.
    Amounts(Vec<Money>),
}

impl Split {
    #[must_use]
    pub fn is_shared(&self) -> bool {
        !matches!(self, Self::Unshared)
    }
}

/// Computes the shares of `total` for `transaction_id`.
///
/// Fails with [`EngineError::InvalidSplit`] when the parts cannot reconcile
/// with the total, when more (or fewer) than two parties are given, or when a
/// shared split has no counterpart.
pub fn allocate(
    transaction_id: Uuid,
    total: Money,
    owner: &str,
    counterpart: Option<&str>,
    split: &Split,
) -> ResultEngine<Vec<TransactionShare>> {
    if !total.is_positive() {
        return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
    }

    let parts = match split {
        Split::Unshared => return Ok(Vec::new()),
        Split::Percentages(percentages) => {
            ensure_parties(percentages.len())?;
            by_percentages(total, percentages)?
        }
        Split::Amounts(amounts) => {
            ensure_parties(amounts.len())?;
            by_amounts(total, amounts)?
        }
    };

    let counterpart = counterpart.ok_or_else(|| {
        EngineError::InvalidSplit("a shared transaction needs a counterpart".to_string())
    })?;
    if counterpart == owner {
        return Err(EngineError::InvalidSplit(
            "counterpart must differ from the owner".to_string(),
        ));
    }

    let allocated = checked_sum(parts.iter().map(|(_, amount)| *amount))?;
    if allocated != total {
        return Err(EngineError::InvalidSplit(format!(
            "shares add up to {allocated}, expected {total}"
        )));
    }

    let users = [owner, counterpart];
    Ok(parts
        .into_iter()
        .zip(users)
        .map(|((percentage, amount), user_id)| {
            TransactionShare::new(transaction_id, user_id.to_string(), percentage, amount)
        })
        .collect())
}

/// Re-derives share amounts for a new total, keeping the stored percentages
/// and user assignment.
pub fn reallocate(total: Money, shares: &[TransactionShare]) -> ResultEngine<Vec<TransactionShare>> {
    if shares.is_empty() {
        return Ok(Vec::new());
    }
    ensure_parties(shares.len())?;
    let percentages: Vec<Percent> = shares.iter().map(|s| s.percentage).collect();
    let parts = by_percentages(total, &percentages)?;
    Ok(shares
        .iter()
        .zip(parts)
        .map(|(share, (percentage, amount))| TransactionShare {
            percentage,
            amount,
            ..share.clone()
        })
        .collect())
}

fn ensure_parties(count: usize) -> ResultEngine<()> {
    if count > PARTIES {
        return Err(EngineError::InvalidSplit(format!(
            "splitting between {count} parties is not supported"
        )));
    }
    if count < PARTIES {
        return Err(EngineError::InvalidSplit(
            "a shared split needs exactly two parties".to_string(),
        ));
    }
    Ok(())
}

/// Sums share amounts, rejecting totals that do not fit in [`Money`].
fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> ResultEngine<Money> {
    amounts
        .into_iter()
        .try_fold(Money::ZERO, Money::checked_add)
        .ok_or_else(|| EngineError::InvalidSplit("share amounts are too large".to_string()))
}

fn by_percentages(total: Money, percentages: &[Percent]) -> ResultEngine<Vec<(Percent, Money)>> {
    if let Some(bad) = percentages.iter().find(|p| !p.is_share()) {
        return Err(EngineError::InvalidSplit(format!(
            "percentage {bad} is outside 0..100"
        )));
    }

    // One basis point of slack covers splits such as 33.33 / 66.66.
    let sum: i64 = percentages.iter().map(|p| p.basis_points()).sum();
    if (sum - Percent::SCALE).abs() > 1 {
        return Err(EngineError::InvalidSplit(format!(
            "percentages add up to {}, expected 100.00",
            Percent::new(sum)
        )));
    }

    let mut parts = Vec::with_capacity(percentages.len());
    let mut allocated_amount = Money::ZERO;
    let mut allocated_percent = Percent::ZERO;
    let last = percentages.len() - 1;
    for (idx, percentage) in percentages.iter().enumerate() {
        if idx == last {
            parts.push((Percent::HUNDRED - allocated_percent, total - allocated_amount));
        } else {
            let amount = total.mul_percent(*percentage);
            allocated_amount += amount;
            allocated_percent = allocated_percent + *percentage;
            parts.push((*percentage, amount));
        }
    }
    Ok(parts)
}

fn by_amounts(total: Money, amounts: &[Money]) -> ResultEngine<Vec<(Percent, Money)>> {
    if amounts.iter().any(|a| a.is_negative()) {
        return Err(EngineError::InvalidSplit(
            "share amounts must not be negative".to_string(),
        ));
    }
    let sum = checked_sum(amounts.iter().copied())?;
    if sum != total {
        return Err(EngineError::InvalidSplit(format!(
            "shares add up to {sum}, expected {total}"
        )));
    }

    let mut parts = Vec::with_capacity(amounts.len());
    let mut allocated_percent = Percent::ZERO;
    let last = amounts.len() - 1;
    for (idx, amount) in amounts.iter().enumerate() {
        let percentage = if idx == last {
            Percent::HUNDRED - allocated_percent
        } else {
            amount.percent_of(total)
        };
        allocated_percent = allocated_percent + percentage;
        parts.push((percentage, *amount));
    }
    Ok(parts)
}
