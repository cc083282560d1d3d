//! Bounded-concurrency batch jobs against rate-limited upstreams.
//!
//! [`runner::run`] is the core: it applies an async processor to every item
//! of a batch with at most K in flight and returns one [`runner::JobResult`]
//! per item, in input order. The other modules are call sites built on it.

pub mod aggregate;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod matches;
pub mod retry;
pub mod reviews;
pub mod runner;
pub mod state_machine;
pub mod transcribe;
pub mod ui;
pub mod wiki;
