#![deny(warnings)]

//! Economic effects for Venture Tycoon.
//!
//! This crate provides:
//! - The effect resolver, turning a choice's declared ranges into concrete
//!   deltas with seeded randomness
//! - The temporary effect ledger, tracking multi-month revenue/expense
//!   modifiers until they run out

mod ledger;
mod resolver;

pub use ledger::{EffectLedger, LedgerTick, TemporaryEffect};
pub use resolver::{
    draw_plain, draw_stepped, resolve, resolve_against, Amount, EffectDelta, Financials,
    RolledEffect, STEP,
};
