//! `(reserves, collaterals, insuranceLines, registeredEntities)` (§4.6):
//! the state a jurisdiction block producer folds `JBatchOp`s into.

use std::collections::{HashMap, HashSet, VecDeque};

use xln_core::{AccountKey, Amount, EntityId, TokenId};

/// A debt owed by `debtor` to `creditor`, queued FIFO per debtor (§4.6 "FIFO
/// debt enforcement: on any reserve increase, pending debts to that entity
/// at index 0 are repaid first").
#[derive(Clone, Debug, PartialEq)]
pub struct PendingDebt {
    pub creditor: EntityId,
    pub token_id: TokenId,
    pub amount: Amount,
}

#[derive(Clone, Debug, Default)]
pub struct JurisdictionState {
    pub reserves: HashMap<(EntityId, TokenId), Amount>,
    pub collaterals: HashMap<(AccountKey, TokenId), (Amount, Amount)>,
    pub insurance_lines: HashMap<(AccountKey, TokenId), Amount>,
    pub registered_entities: HashSet<EntityId>,
    pending_debts: HashMap<EntityId, VecDeque<PendingDebt>>,
}

impl JurisdictionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve_of(&self, entity_id: &EntityId, token_id: TokenId) -> Amount {
        self.reserves
            .get(&(entity_id.clone(), token_id))
            .cloned()
            .unwrap_or_else(|| Amount::from(0))
    }

    pub fn collateral_of(&self, account: &AccountKey, token_id: TokenId) -> (Amount, Amount) {
        self.collaterals
            .get(&(account.clone(), token_id))
            .cloned()
            .unwrap_or_else(|| (Amount::from(0), Amount::from(0)))
    }

    /// Queue a debt `debtor` owes `creditor`, repaid automatically out of
    /// `debtor`'s future reserve increases, oldest first.
    pub fn register_debt(&mut self, debtor: EntityId, creditor: EntityId, token_id: TokenId, amount: Amount) {
        self.pending_debts.entry(debtor).or_default().push_back(PendingDebt {
            creditor,
            token_id,
            amount,
        });
    }

    /// Credit `amount` of `token_id` to `entity_id`'s reserves, repaying any
    /// queued debts for that token before leaving the remainder on the
    /// entity's own balance.
    pub fn credit_reserve(&mut self, entity_id: &EntityId, token_id: TokenId, amount: Amount) {
        let mut remaining = amount;
        if let Some(queue) = self.pending_debts.get_mut(entity_id) {
            while remaining > Amount::from(0) {
                let Some(front) = queue.front_mut() else { break };
                if front.token_id != token_id {
                    break;
                }
                if front.amount <= remaining {
                    let paid = front.amount.clone();
                    let creditor = front.creditor.clone();
                    queue.pop_front();
                    remaining = remaining - paid.clone();
                    self.bump_reserve(&creditor, token_id, paid);
                } else {
                    front.amount = front.amount.clone() - remaining.clone();
                    self.bump_reserve(&front.creditor.clone(), token_id, remaining.clone());
                    remaining = Amount::from(0);
                }
            }
            if queue.is_empty() {
                self.pending_debts.remove(entity_id);
            }
        }
        if remaining > Amount::from(0) {
            self.bump_reserve(entity_id, token_id, remaining);
        }
    }

    pub fn debit_reserve(&mut self, entity_id: &EntityId, token_id: TokenId, amount: Amount) {
        let have = self.reserve_of(entity_id, token_id);
        self.reserves.insert((entity_id.clone(), token_id), have - amount);
    }

    fn bump_reserve(&mut self, entity_id: &EntityId, token_id: TokenId, amount: Amount) {
        let have = self.reserve_of(entity_id, token_id);
        self.reserves.insert((entity_id.clone(), token_id), have + amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u8) -> EntityId {
        EntityId::from_bytes([id; 32])
    }

    #[test]
    fn reserve_increase_repays_queued_debt_first() {
        let mut state = JurisdictionState::new();
        let debtor = entity(1);
        let creditor = entity(2);
        state.register_debt(debtor.clone(), creditor.clone(), 7, Amount::from(30));

        state.credit_reserve(&debtor, 7, Amount::from(50));

        assert_eq!(state.reserve_of(&creditor, 7), Amount::from(30));
        assert_eq!(state.reserve_of(&debtor, 7), Amount::from(20));
    }

    #[test]
    fn partial_debt_repayment_leaves_remainder_queued() {
        let mut state = JurisdictionState::new();
        let debtor = entity(1);
        let creditor = entity(2);
        state.register_debt(debtor.clone(), creditor.clone(), 7, Amount::from(100));

        state.credit_reserve(&debtor, 7, Amount::from(40));

        assert_eq!(state.reserve_of(&creditor, 7), Amount::from(40));
        assert_eq!(state.reserve_of(&debtor, 7), Amount::from(0));
    }
}
