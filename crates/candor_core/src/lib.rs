//! Abuse-control and idempotent-voting core for the Candor board.
//!
//! This crate is deliberately free of HTTP, database and runtime
//! dependencies. It holds the three pieces of the board that have real
//! correctness hazards under concurrent anonymous traffic:
//!
//! - [`identity`] — one-way digests of caller identity signals, so raw
//!   cookies and addresses are never stored.
//! - [`visitors`] — the per-key token-bucket registry that gates
//!   rate-limited actions, plus the TTL sweep that bounds its memory.
//! - [`vote`] — the idempotent upvote guard: optimistic pre-check, a
//!   conflict-tolerant insert against a [`vote::VoteStore`] collaborator,
//!   and a store-native counter increment.

pub mod identity;
pub mod visitors;
pub mod vote;

pub use identity::{VoteIdentity, digest};
pub use visitors::{RatePolicy, VisitorRegistry};
pub use vote::{UpvoteGuard, VoteError, VoteOutcome, VoteStore, VoteStoreError};
