//! Per-transaction state transitions against an account's
//! `deltas`/`locks`/`swapOffers` (§4.2). Pure functions over borrowed
//! collections so both `enqueueAccountTx`'s validation pass (on a clone)
//! and a real commit (on `self`) share one code path.

use std::collections::HashMap;

use xln_core::{
    apply_payment, can_apply_payment, AccountTx, Amount, Delta, Height, LockId, OfferId, TokenId,
};
use xln_htlc::{fill_ratio, HtlcLock, SwapOffer, SwapStatus};

use crate::error::{AccountError, AccountResult};
use crate::AccountEvent;

/// Mutable view over one account's financial state, borrowed for the
/// duration of a single transaction application.
pub struct TxContext<'a> {
    pub is_left: bool,
    pub current_j_height: Height,
    pub deltas: &'a mut HashMap<TokenId, Delta>,
    pub locks: &'a mut HashMap<LockId, HtlcLock>,
    pub swap_offers: &'a mut HashMap<OfferId, SwapOffer>,
    pub swap_sequence: &'a mut u64,
}

/// A tx touching a token that has never been seen before implicitly
/// `addTokenIfMissing`s it — this always succeeds.
fn delta_mut(deltas: &mut HashMap<TokenId, Delta>, token_id: TokenId) -> &mut Delta {
    deltas.entry(token_id).or_insert_with(|| Delta::new(token_id))
}

/// Apply one `AccountTx` to `ctx`, returning an `AccountEvent` to surface to
/// the owning entity when the tx propagates upstream (HTLC reveal/timeout).
pub fn apply_account_tx(
    ctx: &mut TxContext,
    tx: &AccountTx,
) -> AccountResult<Option<AccountEvent>> {
    match tx {
        AccountTx::DirectPayment {
            token_id,
            amount,
            sender_is_left,
        } => {
            let d = delta_mut(ctx.deltas, *token_id);
            apply_payment(d, *sender_is_left, amount)?;
            Ok(None)
        }

        AccountTx::AddDelta { token_id } => {
            ctx.deltas
                .entry(*token_id)
                .or_insert_with(|| Delta::new(*token_id));
            Ok(None)
        }

        AccountTx::SetCreditLimit {
            side_is_left,
            token_id,
            amount,
        } => {
            let d = delta_mut(ctx.deltas, *token_id);
            if *side_is_left {
                d.left_credit_limit = amount.clone();
            } else {
                d.right_credit_limit = amount.clone();
            }
            d.check_invariants()?;
            Ok(None)
        }

        AccountTx::HtlcLock {
            lock_id,
            token_id,
            amount,
            hashlock,
            reveal_before_height,
            sender_is_left,
            ..
        } => {
            let d = delta_mut(ctx.deltas, *token_id);
            if !can_apply_payment(d, *sender_is_left, amount) {
                return Err(AccountError::Delta(xln_core::CoreError::InsufficientCapacity {
                    need: amount.to_string(),
                    have: "0".into(),
                }));
            }
            if *sender_is_left {
                d.left_htlc_hold += amount;
            } else {
                d.right_htlc_hold += amount;
            }
            d.check_invariants()?;
            ctx.locks.insert(
                lock_id.clone(),
                HtlcLock::new(
                    lock_id.clone(),
                    *token_id,
                    amount.clone(),
                    *hashlock,
                    *reveal_before_height,
                    *sender_is_left,
                ),
            );
            Ok(None)
        }

        AccountTx::HtlcReveal { lock_id, secret } => {
            let lock = ctx
                .locks
                .get(lock_id)
                .cloned()
                .ok_or_else(|| AccountError::UnknownLock(lock_id.clone()))?;
            let mut secret_arr = [0u8; 32];
            if secret.len() != 32 {
                return Err(AccountError::HtlcHashMismatch(lock_id.clone()));
            }
            secret_arr.copy_from_slice(secret);
            if !lock.secret_matches(&secret_arr) {
                return Err(AccountError::HtlcHashMismatch(lock_id.clone()));
            }
            let d = delta_mut(ctx.deltas, lock.token_id);
            if lock.held_from_left {
                d.left_htlc_hold -= &lock.amount;
            } else {
                d.right_htlc_hold -= &lock.amount;
            }
            apply_payment(d, lock.held_from_left, &lock.amount)?;
            ctx.locks.remove(lock_id);
            Ok(Some(AccountEvent::HtlcRevealed {
                hashlock: lock.hashlock,
                secret: secret.clone(),
            }))
        }

        AccountTx::HtlcTimeout { lock_id } => {
            let lock = ctx
                .locks
                .get(lock_id)
                .cloned()
                .ok_or_else(|| AccountError::UnknownLock(lock_id.clone()))?;
            if !lock.is_expired(ctx.current_j_height) {
                return Err(AccountError::HtlcNotExpired {
                    lock_id: lock_id.clone(),
                    current: ctx.current_j_height,
                    reveal_before: lock.reveal_before_height,
                });
            }
            let d = delta_mut(ctx.deltas, lock.token_id);
            if lock.held_from_left {
                d.left_htlc_hold -= &lock.amount;
            } else {
                d.right_htlc_hold -= &lock.amount;
            }
            ctx.locks.remove(lock_id);
            Ok(Some(AccountEvent::HtlcTimedOut {
                hashlock: lock.hashlock,
            }))
        }

        AccountTx::SwapOffer {
            offer_id,
            maker_is_left,
            give_token_id,
            give_amount,
            want_token_id,
            want_amount,
            min_fill_ratio,
        } => {
            let d = delta_mut(ctx.deltas, *give_token_id);
            if !can_apply_payment(d, *maker_is_left, give_amount) {
                return Err(AccountError::Delta(xln_core::CoreError::InsufficientCapacity {
                    need: give_amount.to_string(),
                    have: "0".into(),
                }));
            }
            if *maker_is_left {
                d.left_swap_hold += give_amount;
            } else {
                d.right_swap_hold += give_amount;
            }
            d.check_invariants()?;
            *ctx.swap_sequence += 1;
            ctx.swap_offers.insert(
                offer_id.clone(),
                SwapOffer::new(
                    offer_id.clone(),
                    *give_token_id,
                    give_amount.clone(),
                    *want_token_id,
                    want_amount.clone(),
                    *min_fill_ratio,
                    *maker_is_left,
                    *ctx.swap_sequence,
                ),
            );
            Ok(None)
        }

        AccountTx::SwapResolve {
            offer_id,
            fill_ratio: requested_ratio,
            cancel_remainder,
        } => {
            let offer = ctx
                .swap_offers
                .get(offer_id)
                .cloned()
                .ok_or_else(|| AccountError::UnknownOffer(offer_id.clone()))?;
            if *requested_ratio < offer.min_fill_ratio {
                return Err(AccountError::FillRatioBelowMinimum {
                    got: *requested_ratio,
                    min: offer.min_fill_ratio,
                });
            }
            let denom = Amount::from(xln_htlc::SWAP_FILL_RATIO_DENOMINATOR);
            let filled_give = (&offer.give_amount * *requested_ratio) / &denom;
            let filled_want = (&offer.want_amount * *requested_ratio) / &denom;

            let give_delta = delta_mut(ctx.deltas, offer.give_token_id);
            if offer.maker_is_left {
                give_delta.left_swap_hold -= &filled_give;
            } else {
                give_delta.right_swap_hold -= &filled_give;
            }
            apply_payment(give_delta, offer.maker_is_left, &filled_give)?;

            let want_delta = delta_mut(ctx.deltas, offer.want_token_id);
            apply_payment(want_delta, !offer.maker_is_left, &filled_want)?;

            let full_fill = fill_ratio(&filled_give, &offer.give_amount)
                >= xln_htlc::SWAP_FILL_RATIO_DENOMINATOR;
            if *cancel_remainder || full_fill {
                // The offer is gone either way — release whatever hold this
                // fill didn't already consume, or a cancelled partial fill
                // leaks `offer.remaining - filled_give` forever (compare
                // `SwapCancel`, which always releases the full remaining
                // hold).
                let leftover_hold = &offer.remaining - &filled_give;
                if leftover_hold > Amount::from(0) {
                    let give_delta = delta_mut(ctx.deltas, offer.give_token_id);
                    if offer.maker_is_left {
                        give_delta.left_swap_hold -= &leftover_hold;
                    } else {
                        give_delta.right_swap_hold -= &leftover_hold;
                    }
                }
                ctx.swap_offers.remove(offer_id);
            } else if let Some(remaining_offer) = ctx.swap_offers.get_mut(offer_id) {
                remaining_offer.give_amount -= &filled_give;
                remaining_offer.want_amount -= &filled_want;
                remaining_offer.remaining -= &filled_give;
                remaining_offer.status = SwapStatus::PartiallyFilled;
            }
            Ok(None)
        }

        AccountTx::SwapCancel { offer_id } => {
            let offer = ctx
                .swap_offers
                .remove(offer_id)
                .ok_or_else(|| AccountError::UnknownOffer(offer_id.clone()))?;
            let d = delta_mut(ctx.deltas, offer.give_token_id);
            if offer.maker_is_left {
                d.left_swap_hold -= &offer.remaining;
            } else {
                d.right_swap_hold -= &offer.remaining;
            }
            Ok(None)
        }

        AccountTx::JSync {
            token_id,
            collateral,
            ondelta,
            ..
        } => {
            let d = delta_mut(ctx.deltas, *token_id);
            d.collateral = collateral.clone();
            d.ondelta = ondelta.clone();
            d.check_invariants()?;
            Ok(None)
        }

        // Withdrawal bookkeeping lives on `AccountMachine` (it needs the
        // `pendingWithdrawals` list, not just the delta map); the machine
        // intercepts these two variants before reaching this function.
        AccountTx::RequestWithdrawal { .. } | AccountTx::ApproveWithdrawal { .. } => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        deltas: &'a mut HashMap<TokenId, Delta>,
        locks: &'a mut HashMap<LockId, HtlcLock>,
        offers: &'a mut HashMap<OfferId, SwapOffer>,
        seq: &'a mut u64,
    ) -> TxContext<'a> {
        TxContext {
            is_left: true,
            current_j_height: 0,
            deltas,
            locks,
            swap_offers: offers,
            swap_sequence: seq,
        }
    }

    #[test]
    fn direct_payment_moves_offdelta() {
        let mut deltas = HashMap::new();
        deltas.insert(1, {
            let mut d = Delta::new(1);
            d.collateral = Amount::from(1_000);
            d
        });
        let mut locks = HashMap::new();
        let mut offers = HashMap::new();
        let mut seq = 0u64;
        let mut c = ctx(&mut deltas, &mut locks, &mut offers, &mut seq);
        apply_account_tx(
            &mut c,
            &AccountTx::DirectPayment {
                token_id: 1,
                amount: Amount::from(100),
                sender_is_left: true,
            },
        )
        .unwrap();
        assert_eq!(deltas[&1].offdelta, Amount::from(-100));
    }

    #[test]
    fn htlc_lock_then_reveal_transfers_and_clears_hold() {
        let mut deltas = HashMap::new();
        deltas.insert(1, {
            let mut d = Delta::new(1);
            d.collateral = Amount::from(1_000);
            d
        });
        let mut locks = HashMap::new();
        let mut offers = HashMap::new();
        let mut seq = 0u64;

        let secret = [3u8; 32];
        let hashlock = xln_crypto::hash(&secret);

        {
            let mut c = ctx(&mut deltas, &mut locks, &mut offers, &mut seq);
            apply_account_tx(
                &mut c,
                &AccountTx::HtlcLock {
                    lock_id: "l1".into(),
                    token_id: 1,
                    amount: Amount::from(200),
                    hashlock,
                    timelock: 0,
                    reveal_before_height: 50,
                    sender_is_left: true,
                    envelope: None,
                },
            )
            .unwrap();
        }
        assert_eq!(deltas[&1].left_htlc_hold, Amount::from(200));

        {
            let mut c = ctx(&mut deltas, &mut locks, &mut offers, &mut seq);
            let event = apply_account_tx(
                &mut c,
                &AccountTx::HtlcReveal {
                    lock_id: "l1".into(),
                    secret: secret.to_vec(),
                },
            )
            .unwrap();
            assert!(matches!(event, Some(AccountEvent::HtlcRevealed { .. })));
        }
        assert_eq!(deltas[&1].left_htlc_hold, Amount::from(0));
        assert_eq!(deltas[&1].offdelta, Amount::from(-200));
        assert!(locks.is_empty());
    }

    #[test]
    fn htlc_timeout_rejected_before_expiry() {
        let mut deltas = HashMap::new();
        deltas.insert(1, {
            let mut d = Delta::new(1);
            d.collateral = Amount::from(1_000);
            d
        });
        let mut locks = HashMap::new();
        let mut offers = HashMap::new();
        let mut seq = 0u64;
        {
            let mut c = ctx(&mut deltas, &mut locks, &mut offers, &mut seq);
            apply_account_tx(
                &mut c,
                &AccountTx::HtlcLock {
                    lock_id: "l1".into(),
                    token_id: 1,
                    amount: Amount::from(50),
                    hashlock: xln_core::Hash32::ZERO,
                    timelock: 0,
                    reveal_before_height: 50,
                    sender_is_left: true,
                    envelope: None,
                },
            )
            .unwrap();
        }
        let mut c = ctx(&mut deltas, &mut locks, &mut offers, &mut seq);
        c.current_j_height = 10;
        let result = apply_account_tx(&mut c, &AccountTx::HtlcTimeout { lock_id: "l1".into() });
        assert!(matches!(result, Err(AccountError::HtlcNotExpired { .. })));
    }
}
