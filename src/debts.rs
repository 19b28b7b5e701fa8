use std::collections::BTreeMap;
use std::mem::swap;

use serde::{Deserialize, Serialize};

use crate::balance::{compute_balances, SettlementPolicy};
use crate::exchange::{Exchange, SETTLED_EPSILON};
use crate::schemas::{GroupLedger, MemberId};
use crate::split::split_amount;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
struct UserPair {
    user1: MemberId,
    user2: MemberId,
}

/// What the requesting user owes to one member of one group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub owed_to: MemberId,
    pub amount: f64,
    pub group_id: String,
}

// Records that `debtor` owes `creditor` the given amount. Pairs are keyed in
// alphabetical order so both directions end up in the same entry
fn record(
    balances_between_people: &mut BTreeMap<UserPair, f64>,
    creditor: &str,
    debtor: &str,
    amount: f64,
) {
    let (pair, amount) = if creditor > debtor {
        (
            UserPair {
                user1: debtor.to_string(),
                user2: creditor.to_string(),
            },
            -amount,
        )
    } else {
        (
            UserPair {
                user1: creditor.to_string(),
                user2: debtor.to_string(),
            },
            amount,
        )
    };
    balances_between_people
        .entry(pair)
        .and_modify(|balance| *balance += amount)
        .or_insert(amount);
}

/// The exchanges that settle each pair of members directly: every participant
/// of an expense owes its payer their share, and settlements pay that down.
/// No netting happens across different pairs.
pub fn pairwise_exchanges(ledger: &GroupLedger, policy: SettlementPolicy) -> Vec<Exchange> {
    let mut balances_between_people: BTreeMap<UserPair, f64> = BTreeMap::new();

    for expense in &ledger.expenses {
        let Ok(share) = split_amount(expense.amount, &expense.split_between) else {
            continue;
        };
        for receiver in expense.split_between.iter().filter(|r| **r != expense.paid_by) {
            record(&mut balances_between_people, &expense.paid_by, receiver, share);
        }
    }

    for settlement in ledger.settlements.iter().filter(|s| policy.admits(s)) {
        // Paying someone is owed back until it cancels an earlier debt
        record(
            &mut balances_between_people,
            &settlement.from_member,
            &settlement.to_member,
            settlement.amount,
        );
    }

    let mut exchanges = Vec::new();

    for (people_pair, balance) in balances_between_people {
        if balance.abs() < SETTLED_EPSILON {
            continue;
        }
        let mut payer = people_pair.user2;
        let mut receiver = people_pair.user1;
        // If the balance is smaller than zero we change the direction
        if balance < 0.0 {
            swap(&mut payer, &mut receiver);
        }

        exchanges.push(Exchange {
            payer,
            receiver,
            amount: balance.abs(),
        });
    }

    exchanges
}

/// Everything `user` owes across the given groups.
///
/// Only groups where the user is in the red contribute; there, each member
/// the user owes directly becomes one [`Debt`].
pub fn get_debts(user: &str, ledgers: &[GroupLedger], policy: SettlementPolicy) -> Vec<Debt> {
    let mut debts = Vec::new();
    for ledger in ledgers {
        let balance = compute_balances(ledger, policy)
            .get(user)
            .copied()
            .unwrap_or(0.0);
        if balance > -SETTLED_EPSILON {
            continue;
        }
        debts.extend(
            pairwise_exchanges(ledger, policy)
                .into_iter()
                .filter(|exchange| exchange.payer == user)
                .map(|exchange| Debt {
                    owed_to: exchange.receiver,
                    amount: exchange.amount,
                    group_id: ledger.group.id.clone(),
                }),
        );
    }
    debts.sort_by(|a, b| {
        a.group_id
            .cmp(&b.group_id)
            .then_with(|| a.owed_to.cmp(&b.owed_to))
    });
    debts
}
