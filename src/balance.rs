use std::collections::HashMap;

use crate::schemas::{GroupLedger, Settlement};
use crate::split::split_amount;

pub type Balance = HashMap<String, f64>;

/// Which settlements count towards balances.
///
/// Settlements are recorded unconfirmed and only the receiver can confirm
/// them, so counting unconfirmed ones shows payments optimistically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SettlementPolicy {
    #[default]
    IncludeUnconfirmed,
    ConfirmedOnly,
}

impl SettlementPolicy {
    pub fn admits(self, settlement: &Settlement) -> bool {
        match self {
            SettlementPolicy::IncludeUnconfirmed => true,
            SettlementPolicy::ConfirmedOnly => settlement.confirmed,
        }
    }
}

fn credit(balance: &mut Balance, ledger: &GroupLedger, member: &str, amount: f64) {
    if !ledger.group.has_member(member) {
        tracing::warn!(
            group = %ledger.group.id,
            member,
            "ledger entry references a member outside the group"
        );
    }
    balance
        .entry(member.to_string())
        .and_modify(|v| *v += amount)
        .or_insert(amount);
}

/// Net position of every member of the group: positive means the others owe
/// them, negative means they owe.
pub fn compute_balances(ledger: &GroupLedger, policy: SettlementPolicy) -> Balance {
    let mut balance: Balance = ledger
        .group
        .members
        .iter()
        .map(|member| (member.id.clone(), 0.0))
        .collect();

    for expense in &ledger.expenses {
        let Ok(share) = split_amount(expense.amount, &expense.split_between) else {
            tracing::warn!(expense = %expense.id, "skipping expense with an empty split");
            continue;
        };
        credit(&mut balance, ledger, &expense.paid_by, expense.amount);
        for receiver in &expense.split_between {
            credit(&mut balance, ledger, receiver, -share);
        }
    }

    for settlement in ledger.settlements.iter().filter(|s| policy.admits(s)) {
        credit(&mut balance, ledger, &settlement.from_member, settlement.amount);
        credit(&mut balance, ledger, &settlement.to_member, -settlement.amount);
    }

    balance
}
