//! Core domain + application logic for the quip reply bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / Discord live
//! behind ports (traits) implemented in adapter crates.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod phrases;
pub mod ports;
pub mod respond;
pub mod supervisor;

pub use errors::{Error, Result};
