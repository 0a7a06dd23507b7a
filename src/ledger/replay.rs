//! Ledger chain replay
//!
//! Replays the ledger entries of one account and checks that they form an
//! unbroken chain ending at the current balance. Transfers move balances
//! without writing ledger entries, so an account that took part in one shows
//! a gap at that point; the report lists every such discrepancy.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{AccountId, LedgerEntryId, LedgerLine, TransactionType};

/// One discrepancy found while replaying
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainBreak {
    /// after ≠ before ± amount within one entry
    Arithmetic {
        entry_id: LedgerEntryId,
        expected_after: Decimal,
        actual_after: Decimal,
    },
    /// before ≠ the previous entry's after
    Gap {
        entry_id: LedgerEntryId,
        expected_before: Decimal,
        actual_before: Decimal,
    },
    /// the last entry's after ≠ the current balance
    Drift {
        ledger_balance: Decimal,
        account_balance: Decimal,
    },
}

/// Outcome of replaying an account's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub account_id: AccountId,
    pub entries_checked: usize,
    /// balance_before of the first entry
    pub opening_balance: Option<Decimal>,
    /// opening balance plus deposits minus withdrawals
    pub replayed_balance: Option<Decimal>,
    pub account_balance: Decimal,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub breaks: Vec<ChainBreak>,
}

impl ReplayReport {
    pub fn is_consistent(&self) -> bool {
        self.breaks.is_empty()
    }
}

/// Replay `lines` (in creation order) against the account's current balance
pub fn replay(account_id: AccountId, account_balance: Decimal, lines: &[LedgerLine]) -> ReplayReport {
    let mut breaks = Vec::new();
    let mut total_deposits = Decimal::ZERO;
    let mut total_withdrawals = Decimal::ZERO;
    let mut previous_after: Option<Decimal> = None;

    for line in lines {
        let before = line.entry.balance_before.value();
        let after = line.entry.balance_after.value();
        let amount = line.amount.value();

        let expected_after = match line.kind {
            TransactionType::Deposit => {
                total_deposits += amount;
                before + amount
            }
            TransactionType::Withdrawal => {
                total_withdrawals += amount;
                before - amount
            }
        };

        if let Some(expected_before) = previous_after {
            if expected_before != before {
                breaks.push(ChainBreak::Gap {
                    entry_id: line.entry.id,
                    expected_before,
                    actual_before: before,
                });
            }
        }

        if expected_after != after {
            breaks.push(ChainBreak::Arithmetic {
                entry_id: line.entry.id,
                expected_after,
                actual_after: after,
            });
        }

        previous_after = Some(after);
    }

    if let Some(ledger_balance) = previous_after {
        if ledger_balance != account_balance {
            breaks.push(ChainBreak::Drift {
                ledger_balance,
                account_balance,
            });
        }
    }

    let opening_balance = lines.first().map(|l| l.entry.balance_before.value());

    ReplayReport {
        account_id,
        entries_checked: lines.len(),
        opening_balance,
        replayed_balance: opening_balance.map(|o| o + total_deposits - total_withdrawals),
        account_balance,
        total_deposits,
        total_withdrawals,
        breaks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, Balance, LedgerEntry};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn line(id: i64, kind: TransactionType, amount: Decimal, before: Decimal, after: Decimal) -> LedgerLine {
        LedgerLine {
            entry: LedgerEntry {
                id,
                balance_before: Balance::new(before).unwrap(),
                balance_after: Balance::new(after).unwrap(),
                account_id: 1,
                transaction_id: id,
                created_at: Utc::now(),
            },
            kind,
            amount: Amount::new(amount).unwrap(),
        }
    }

    #[test]
    fn test_consistent_chain() {
        let lines = vec![
            line(1, TransactionType::Deposit, dec!(500), dec!(1000), dec!(1500)),
            line(2, TransactionType::Withdrawal, dec!(200), dec!(1500), dec!(1300)),
            line(3, TransactionType::Deposit, dec!(0), dec!(1300), dec!(1300)),
        ];

        let report = replay(1, dec!(1300), &lines);

        assert!(report.is_consistent());
        assert_eq!(report.entries_checked, 3);
        assert_eq!(report.opening_balance, Some(dec!(1000)));
        assert_eq!(report.replayed_balance, Some(dec!(1300)));
        assert_eq!(report.total_deposits, dec!(500));
        assert_eq!(report.total_withdrawals, dec!(200));
    }

    #[test]
    fn test_gap_from_transfer_reported() {
        // 100 moved out by a transfer between the two entries
        let lines = vec![
            line(1, TransactionType::Deposit, dec!(300), dec!(0), dec!(300)),
            line(2, TransactionType::Deposit, dec!(50), dec!(200), dec!(250)),
        ];

        let report = replay(1, dec!(250), &lines);

        assert_eq!(
            report.breaks,
            vec![ChainBreak::Gap {
                entry_id: 2,
                expected_before: dec!(300),
                actual_before: dec!(200),
            }]
        );
    }

    #[test]
    fn test_arithmetic_and_drift_reported() {
        let lines = vec![line(1, TransactionType::Withdrawal, dec!(10), dec!(100), dec!(95))];

        let report = replay(1, dec!(80), &lines);

        assert!(report.breaks.contains(&ChainBreak::Arithmetic {
            entry_id: 1,
            expected_after: dec!(90),
            actual_after: dec!(95),
        }));
        assert!(report.breaks.contains(&ChainBreak::Drift {
            ledger_balance: dec!(95),
            account_balance: dec!(80),
        }));
    }

    #[test]
    fn test_empty_ledger_is_consistent() {
        let report = replay(1, dec!(42), &[]);
        assert!(report.is_consistent());
        assert_eq!(report.opening_balance, None);
    }
}
