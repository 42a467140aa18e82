//! Campaign payout engine.
//!
//! Settles creator campaigns: computes each submission's share of a
//! campaign's net budget with a per-participant cap, refreshes engagement
//! metrics from an external provider, and moves campaigns through lock and
//! distribution on a periodic trigger. Final settlement credits wallets and
//! writes ledger transactions atomically and exactly once.

pub mod calculation;
pub mod clients;
pub mod config;
pub mod handlers;
pub mod interfaces;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;
