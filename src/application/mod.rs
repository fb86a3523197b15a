//! Application layer: the loan lifecycle engine.
//!
//! `LoanLifecycleEngine` owns the store, notifier and agreement-letter
//! generator and drives every status transition through a unit of work.

pub mod agreement;
pub mod engine;
