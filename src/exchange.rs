use crate::balance::{compute_balances, SettlementPolicy};
use crate::debts::pairwise_exchanges;
use crate::schemas::{GroupLedger, MemberId};
use crate::split::round_to_2_decimals;
use serde::{Deserialize, Serialize};

/// Anything below half a cent is considered settled.
pub const SETTLED_EPSILON: f64 = 0.005;

#[derive(Clone, Debug)]
pub struct PersonalBalance {
    pub id: MemberId,
    pub balance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub payer: MemberId,
    pub receiver: MemberId,
    pub amount: f64,
}

// Greedily matches the biggest debtor with the biggest creditor until
// everyone is within half a cent of zero
fn get_simplified_exchanges(
    mut payers: Vec<PersonalBalance>,
    mut receivers: Vec<PersonalBalance>,
) -> Vec<Exchange> {
    payers.retain(|p| p.balance >= SETTLED_EPSILON);
    receivers.retain(|r| r.balance >= SETTLED_EPSILON);
    // Ties are broken by id so the plan is stable between calls
    let order = |a: &PersonalBalance, b: &PersonalBalance| {
        a.balance.total_cmp(&b.balance).then_with(|| b.id.cmp(&a.id))
    };
    payers.sort_by(order);
    receivers.sort_by(order);

    let mut exchanges: Vec<Exchange> = Vec::new();

    while let (Some(payer), Some(receiver)) = (payers.last_mut(), receivers.last_mut()) {
        let amount = payer.balance.min(receiver.balance);
        exchanges.push(Exchange {
            payer: payer.id.clone(),
            receiver: receiver.id.clone(),
            amount: round_to_2_decimals(amount),
        });
        payer.balance -= amount;
        receiver.balance -= amount;

        if payer.balance < SETTLED_EPSILON {
            payers.pop();
        }
        if receiver.balance < SETTLED_EPSILON {
            receivers.pop();
        }
    }
    exchanges
}

/// Suggested transfers that bring every member of the group back to zero.
pub fn get_exchanges(ledger: &GroupLedger, policy: SettlementPolicy) -> Vec<Exchange> {
    let people_balances = compute_balances(ledger, policy);

    // Divide people into payers and receivers
    let mut payers = Vec::new();
    let mut receivers = Vec::new();

    for (id, balance) in people_balances {
        let person = PersonalBalance {
            id,
            balance: balance.abs(),
        };
        if balance < 0.0 {
            payers.push(person);
        } else {
            receivers.push(person);
        }
    }

    let naive_exchanges: Vec<Exchange> = pairwise_exchanges(ledger, policy)
        .into_iter()
        .map(|exchange| Exchange {
            amount: round_to_2_decimals(exchange.amount),
            ..exchange
        })
        .collect();
    let simplified_exchanges = get_simplified_exchanges(payers, receivers);

    // Fall back to the direct debts when greedy matching is no shorter
    if simplified_exchanges.len() < naive_exchanges.len() {
        simplified_exchanges
    } else {
        naive_exchanges
    }
}
