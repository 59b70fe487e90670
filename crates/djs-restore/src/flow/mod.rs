//! Control-flow unflattening.
//!
//! Four encodings, one module each. All of them rebuild the original
//! statement order and then delete the dispatch machinery; a loop that
//! cannot be decoded safely is reported and left in place.

pub mod control_walk;
pub mod flag_walk;
pub mod logical_seq;
pub mod switch_dispatch;
