//! Live mtr-style hop monitor.
//!
//! Samples (one measurement per hop) arrive on a channel from [`source`],
//! are folded into per-hop and per-responder statistics by [`monitor`], and
//! are presented through the [`tui`] or the [`export`] writers.

pub mod cli;
pub mod config;
pub mod export;
pub mod monitor;
pub mod prefs;
pub mod source;
pub mod state;
pub mod tui;
