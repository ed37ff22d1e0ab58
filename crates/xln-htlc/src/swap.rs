//! Swap offers and the optional per-account-pair orderbook extension
//! (§4.3): price-time priority over an integer tick grid, fill-or-kill and
//! immediate-or-cancel evaluated by dry-run simulation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use xln_core::{Amount, OfferId, TokenId};

use crate::SWAP_FILL_RATIO_DENOMINATOR;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SwapStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

/// A maker's standing offer to swap `give_amount` of `give_token_id` for
/// `want_amount` of `want_token_id`, held against the maker's outgoing
/// capacity via `leftSwapHold`/`rightSwapHold`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SwapOffer {
    pub offer_id: OfferId,
    pub give_token_id: TokenId,
    pub give_amount: Amount,
    pub want_token_id: TokenId,
    pub want_amount: Amount,
    pub min_fill_ratio: u32,
    /// Remaining `give_amount` not yet matched.
    pub remaining: Amount,
    pub maker_is_left: bool,
    pub status: SwapStatus,
    /// Insertion order, used to break ties at the same tick under
    /// price-time priority.
    pub sequence: u64,
}

impl SwapOffer {
    pub fn new(
        offer_id: OfferId,
        give_token_id: TokenId,
        give_amount: Amount,
        want_token_id: TokenId,
        want_amount: Amount,
        min_fill_ratio: u32,
        maker_is_left: bool,
        sequence: u64,
    ) -> Self {
        Self {
            offer_id,
            give_token_id,
            give_amount: give_amount.clone(),
            want_token_id,
            want_amount,
            min_fill_ratio,
            remaining: give_amount,
            maker_is_left,
            status: SwapStatus::Open,
            sequence,
        }
    }

    /// Integer tick price: `want_amount * DENOMINATOR / give_amount`, fixed
    /// at denominator `SWAP_FILL_RATIO_DENOMINATOR` so no float ever enters
    /// a capacity or matching decision.
    pub fn tick_price(&self) -> u64 {
        if self.give_amount == Amount::from(0) {
            return 0;
        }
        let scaled = &self.want_amount * SWAP_FILL_RATIO_DENOMINATOR;
        let q = scaled / &self.give_amount;
        q.try_into().unwrap_or(u64::MAX)
    }
}

/// Fill-ratio numerator out of `SWAP_FILL_RATIO_DENOMINATOR`, describing how
/// much of an order a match consumed.
pub fn fill_ratio(filled: &Amount, total: &Amount) -> u32 {
    if *total == Amount::from(0) {
        return 0;
    }
    let scaled = filled * SWAP_FILL_RATIO_DENOMINATOR;
    let ratio = &scaled / total;
    ratio.try_into().unwrap_or(SWAP_FILL_RATIO_DENOMINATOR)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStyle {
    /// Must fill the full requested amount or nothing happens.
    FillOrKill,
    /// Fill what is immediately available, cancel the remainder.
    ImmediateOrCancel,
    /// Rest on the book if not immediately fillable.
    GoodTilCancel,
}

/// Price-time priority order book for one token pair within an account's
/// `orderbookExt`. Bids and asks are kept in per-tick FIFOs; a bitmap tracks
/// which ticks are non-empty for O(1) best-price lookup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderBook {
    bids: BTreeMap<u64, VecDeque<OfferId>>,
    asks: BTreeMap<u64, VecDeque<OfferId>>,
    /// Bit `i` set means tick bucket `i` (mod 32) has at least one resting
    /// order; a coarse accelerator checked before the BTreeMap scan.
    bid_bitmap: u32,
    ask_bitmap: u32,
    self_trade_prevention: bool,
}

impl OrderBook {
    pub fn new(self_trade_prevention: bool) -> Self {
        Self {
            self_trade_prevention,
            ..Default::default()
        }
    }

    fn bitmap_bit(tick: u64) -> u32 {
        1u32 << (tick % 32)
    }

    pub fn insert_bid(&mut self, tick: u64, offer_id: OfferId) {
        self.bids.entry(tick).or_default().push_back(offer_id);
        self.bid_bitmap |= Self::bitmap_bit(tick);
    }

    pub fn insert_ask(&mut self, tick: u64, offer_id: OfferId) {
        self.asks.entry(tick).or_default().push_back(offer_id);
        self.ask_bitmap |= Self::bitmap_bit(tick);
    }

    pub fn best_bid(&self) -> Option<u64> {
        if self.bid_bitmap == 0 {
            return None;
        }
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<u64> {
        if self.ask_bitmap == 0 {
            return None;
        }
        self.asks.keys().next().copied()
    }

    pub fn remove_empty_tick(&mut self, tick: u64, is_bid: bool) {
        let (book, bitmap) = if is_bid {
            (&mut self.bids, &mut self.bid_bitmap)
        } else {
            (&mut self.asks, &mut self.ask_bitmap)
        };
        let empty = book.get(&tick).map(|q| q.is_empty()).unwrap_or(false);
        if empty {
            book.remove(&tick);
        }
        if !book.contains_key(&tick) {
            *bitmap &= !Self::bitmap_bit(tick);
        }
    }

    /// Pre-flight simulation: would a taker order of `style` fill right
    /// now? Never mutates the book — callers apply the match only after
    /// this returns `true` for fill-or-kill, or compute the achievable
    /// partial fill for immediate-or-cancel.
    pub fn dry_run_crosses(&self, taker_is_bid: bool, limit_tick: u64) -> bool {
        if self.self_trade_prevention {
            // Self-trade prevention is enforced by the caller (it knows
            // the taker's own open offers); the book only reports whether
            // a price-compatible resting order exists.
        }
        if taker_is_bid {
            self.best_ask().is_some_and(|ask| ask <= limit_tick)
        } else {
            self.best_bid().is_some_and(|bid| bid >= limit_tick)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_price_is_fixed_point_scaled() {
        let offer = SwapOffer::new(
            "o1".into(),
            1,
            Amount::from(100),
            2,
            Amount::from(50),
            0,
            true,
            0,
        );
        // 50/100 * 65535 = 32767 (integer division)
        assert_eq!(offer.tick_price(), 32_767);
    }

    #[test]
    fn bitmap_tracks_non_empty_ticks() {
        let mut book = OrderBook::new(false);
        assert!(book.best_bid().is_none());
        book.insert_bid(100, "bid-1".into());
        assert_eq!(book.best_bid(), Some(100));
        book.insert_bid(105, "bid-2".into());
        assert_eq!(book.best_bid(), Some(105));
    }

    #[test]
    fn dry_run_never_mutates_book() {
        let mut book = OrderBook::new(false);
        book.insert_ask(100, "ask-1".into());
        assert!(book.dry_run_crosses(true, 105));
        assert!(!book.dry_run_crosses(true, 95));
        assert_eq!(book.best_ask(), Some(100));
    }
}
