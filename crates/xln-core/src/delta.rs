//! Delta Algebra (§4.1): pure functions over a per-token bilateral `Delta`.
//!
//! All amounts are arbitrary-precision signed integers ([`Amount`]); nothing
//! in this module performs floating-point arithmetic or silently saturates.
//! Token decimals are metadata the delta algebra never interprets.

use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Amount, TokenId};

fn zero() -> Amount {
    Amount::zero()
}

/// Per-token bilateral balance object (§3 Delta).
///
/// `delta = ondelta + offdelta` is the signed net position. By convention,
/// `delta >= 0` means collateral+claims currently favor the canonical-left
/// side (left is owed `delta`); `delta < 0` means the right side is owed
/// `-delta`. `ondelta` only changes via `j_sync` (§4.2); `offdelta` changes
/// via bilateral payments, HTLC settlement, and swap settlement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    pub token_id: TokenId,
    /// Collateral actually deposited on-chain for this token (>= 0).
    pub collateral: Amount,
    /// Last value observed from a finalized J-block (§4.2 `j_sync`).
    pub ondelta: Amount,
    /// Off-chain-only adjustment accumulated by bilateral frames.
    pub offdelta: Amount,
    /// Credit left may hold beyond collateral when `delta >= 0` (>= 0).
    pub left_credit_limit: Amount,
    /// Credit right may hold beyond collateral when `delta < 0` (>= 0).
    pub right_credit_limit: Amount,
    /// Optional soft spend allowance further bounding left's out-capacity.
    pub left_allowance: Option<Amount>,
    /// Optional soft spend allowance further bounding right's out-capacity.
    pub right_allowance: Option<Amount>,
    /// Amount left has locked into outstanding HTLCs as sender (>= 0).
    pub left_htlc_hold: Amount,
    /// Amount right has locked into outstanding HTLCs as sender (>= 0).
    pub right_htlc_hold: Amount,
    /// Amount left has locked into outstanding swap offers as maker (>= 0).
    pub left_swap_hold: Amount,
    /// Amount right has locked into outstanding swap offers as maker (>= 0).
    pub right_swap_hold: Amount,
}

impl Delta {
    /// `addTokenIfMissing`: a freshly initialized delta for `token_id`, zeroed
    /// with no credit extended on either side (§4.1, resolved per
    /// SPEC_FULL.md's open-question decision — no implicit credit).
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            collateral: zero(),
            ondelta: zero(),
            offdelta: zero(),
            left_credit_limit: zero(),
            right_credit_limit: zero(),
            left_allowance: None,
            right_allowance: None,
            left_htlc_hold: zero(),
            right_htlc_hold: zero(),
            left_swap_hold: zero(),
            right_swap_hold: zero(),
        }
    }

    pub fn delta(&self) -> Amount {
        &self.ondelta + &self.offdelta
    }

    fn outgoing_htlc_hold(&self, is_left: bool) -> Amount {
        if is_left {
            self.left_htlc_hold.clone() + self.left_swap_hold.clone()
        } else {
            self.right_htlc_hold.clone() + self.right_swap_hold.clone()
        }
    }

    /// Validate the invariant from §3: `|delta| <= collateral +
    /// (delta<0 ? right_credit_limit : left_credit_limit)`, and that holds
    /// never exceed the owner's remaining capacity.
    pub fn check_invariants(&self) -> CoreResult<()> {
        let d = self.delta();
        let bound = if d < zero() {
            &self.collateral + &self.right_credit_limit
        } else {
            &self.collateral + &self.left_credit_limit
        };
        if d.magnitude_abs() > bound {
            return Err(CoreError::CapacitySafetyViolated {
                delta: d.to_string(),
                bound: bound.to_string(),
            });
        }
        for (is_left, label) in [(true, "left"), (false, "right")] {
            let peer_credit_limit = if is_left {
                &self.right_credit_limit
            } else {
                &self.left_credit_limit
            };
            let own_delta = if is_left { d.clone() } else { -d.clone() };
            let capacity_before_holds = max0(&self.collateral + peer_credit_limit + &own_delta);
            let hold = self.outgoing_htlc_hold(is_left);
            if hold > capacity_before_holds {
                return Err(CoreError::Other(format!(
                    "{label} holds exceed remaining capacity"
                )));
            }
        }
        Ok(())
    }
}

trait AbsExt {
    fn magnitude_abs(&self) -> Amount;
}
impl AbsExt for Amount {
    fn magnitude_abs(&self) -> Amount {
        if *self < Amount::zero() {
            -self.clone()
        } else {
            self.clone()
        }
    }
}

/// Everything `deriveDelta` (§4.1) exposes for a given side of the account.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedDelta {
    pub delta: Amount,
    pub collateral: Amount,
    pub in_capacity: Amount,
    pub out_capacity: Amount,
    pub own_credit_limit: Amount,
    pub peer_credit_limit: Amount,
    /// Headroom of `in_capacity` backed by this side's own credit limit.
    pub in_own_credit: Amount,
    /// Portion of this side's own credit limit currently in use (self is
    /// owed beyond collateral, at the peer's risk).
    pub out_own_credit: Amount,
    /// Portion of the peer's credit limit currently in use (self is in
    /// debt beyond collateral, at this side's risk).
    pub in_peer_credit: Amount,
    /// Headroom of `out_capacity` backed by the peer's credit limit.
    pub out_peer_credit: Amount,
    pub in_collateral: Amount,
    pub out_collateral: Amount,
    pub in_allowance: Option<Amount>,
    pub out_allowance: Option<Amount>,
    pub total_capacity: Amount,
}

fn clamp(v: Amount, lo: Amount, hi: Amount) -> Amount {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

fn max0(v: Amount) -> Amount {
    if v < zero() {
        zero()
    } else {
        v
    }
}

/// `deriveDelta(d, isLeft)` (§4.1): project a `Delta` into the capacity view
/// for one side of the account.
pub fn derive_delta(d: &Delta, is_left: bool) -> DerivedDelta {
    let delta = d.delta();
    let own_credit_limit = if is_left {
        d.left_credit_limit.clone()
    } else {
        d.right_credit_limit.clone()
    };
    let peer_credit_limit = if is_left {
        d.right_credit_limit.clone()
    } else {
        d.left_credit_limit.clone()
    };
    let own_delta = if is_left { delta.clone() } else { -delta.clone() };
    let collateral = d.collateral.clone();

    let in_capacity = max0(&collateral + &own_credit_limit - &own_delta);
    let out_capacity_before_holds = max0(&collateral + &peer_credit_limit + &own_delta);
    let outgoing_holds = d.outgoing_htlc_hold(is_left);
    let out_capacity = max0(out_capacity_before_holds.clone() - &outgoing_holds);

    let in_collateral = {
        let unclaimed = clamp(&collateral - max0(own_delta.clone()), zero(), collateral.clone());
        if in_capacity < unclaimed {
            in_capacity.clone()
        } else {
            unclaimed
        }
    };
    let in_own_credit = &in_capacity - &in_collateral;

    let out_collateral_full = {
        // Free collateral for outgoing = collateral not already covering self's debt.
        let self_debt_covered = max0(-own_delta.clone());
        let free = clamp(&collateral - &self_debt_covered, zero(), collateral.clone());
        if out_capacity_before_holds < free {
            out_capacity_before_holds.clone()
        } else {
            free
        }
    };
    let out_peer_credit_full = &out_capacity_before_holds - &out_collateral_full;

    // Holds eat into credit-backed capacity first, then collateral-backed.
    let out_peer_credit = max0(&out_peer_credit_full - &outgoing_holds);
    let remaining_hold = max0(&outgoing_holds - &out_peer_credit_full);
    let out_collateral = max0(&out_collateral_full - &remaining_hold);

    let out_own_credit = max0(own_delta.clone() - &collateral);
    let in_peer_credit = max0(-own_delta - &collateral);

    let in_allowance = if is_left {
        d.left_allowance.clone()
    } else {
        d.right_allowance.clone()
    };
    let out_allowance = if is_left {
        d.right_allowance.clone()
    } else {
        d.left_allowance.clone()
    };

    let total_capacity = &in_capacity + &out_capacity;

    DerivedDelta {
        delta,
        collateral,
        in_capacity,
        out_capacity,
        own_credit_limit,
        peer_credit_limit,
        in_own_credit,
        out_own_credit,
        in_peer_credit,
        out_peer_credit,
        in_collateral,
        out_collateral,
        in_allowance,
        out_allowance,
        total_capacity,
    }
}

/// `canApplyPayment`: true iff `amount <= outCapacity` (holds included).
pub fn can_apply_payment(d: &Delta, is_left: bool, amount: &Amount) -> bool {
    if *amount <= zero() {
        return false;
    }
    let derived = derive_delta(d, is_left);
    amount <= &derived.out_capacity
}

/// `applyPayment`: move `offdelta` by `amount`, sender -> receiver. Never
/// mutates `collateral` or `ondelta`.
pub fn apply_payment(d: &mut Delta, is_left: bool, amount: &Amount) -> CoreResult<()> {
    if *amount <= zero() {
        return Err(CoreError::ZeroAmount);
    }
    if !can_apply_payment(d, is_left, amount) {
        let derived = derive_delta(d, is_left);
        return Err(CoreError::InsufficientCapacity {
            need: amount.to_string(),
            have: derived.out_capacity.to_string(),
        });
    }
    // Left sending moves delta negative (left gives up claim); right sending
    // moves delta positive.
    if is_left {
        d.offdelta -= amount;
    } else {
        d.offdelta += amount;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(n: i64) -> Amount {
        Amount::from(n)
    }

    #[test]
    fn fresh_delta_has_zero_capacity_without_collateral() {
        let d = Delta::new(1);
        let derived = derive_delta(&d, true);
        assert_eq!(derived.out_capacity, amt(0));
        assert_eq!(derived.in_capacity, amt(0));
    }

    #[test]
    fn collateral_grants_symmetric_capacity() {
        let mut d = Delta::new(1);
        d.collateral = amt(1_000);
        let left = derive_delta(&d, true);
        let right = derive_delta(&d, false);
        assert_eq!(left.out_capacity, amt(1_000));
        assert_eq!(right.out_capacity, amt(1_000));
        assert_eq!(left.out_capacity, right.in_capacity);
        assert_eq!(right.out_capacity, left.in_capacity);
    }

    #[test]
    fn payment_moves_offdelta_and_respects_capacity() {
        let mut d = Delta::new(1);
        d.collateral = amt(1_000);
        assert!(can_apply_payment(&d, true, &amt(100)));
        apply_payment(&mut d, true, &amt(100)).unwrap();
        assert_eq!(d.offdelta, amt(-100));
        assert_eq!(d.delta(), amt(-100));

        // Left has spent down; right now has more out-capacity, left less.
        let left = derive_delta(&d, true);
        let right = derive_delta(&d, false);
        assert_eq!(left.out_capacity, amt(900));
        assert_eq!(right.out_capacity, amt(1_100));
    }

    #[test]
    fn payment_exceeding_capacity_rejected() {
        let mut d = Delta::new(1);
        d.collateral = amt(100);
        assert!(!can_apply_payment(&d, true, &amt(1_000)));
        assert!(apply_payment(&mut d, true, &amt(1_000)).is_err());
    }

    #[test]
    fn credit_limit_extends_capacity_beyond_collateral() {
        let mut d = Delta::new(1);
        d.collateral = amt(100);
        d.right_credit_limit = amt(500); // extended to the right, bounds delta<0
        let left = derive_delta(&d, true);
        // left's out_capacity can push delta negative down to -(collateral+right_credit_limit)
        assert_eq!(left.out_capacity, amt(600));
    }

    #[test]
    fn htlc_hold_reduces_out_capacity_only() {
        let mut d = Delta::new(1);
        d.collateral = amt(1_000);
        d.left_htlc_hold = amt(200);
        let left = derive_delta(&d, true);
        let right = derive_delta(&d, false);
        assert_eq!(left.out_capacity, amt(800));
        assert_eq!(right.out_capacity, amt(1_000));
    }

    #[test]
    fn invariants_hold_after_payment() {
        let mut d = Delta::new(1);
        d.collateral = amt(1_000);
        apply_payment(&mut d, true, &amt(300)).unwrap();
        d.check_invariants().unwrap();
    }
}
