//! Scheduled market-report bot: fetches multi-timeframe candles, runs the
//! technical-analysis engine, asks an LLM for a narrative read, and posts
//! the combined report to a Discord webhook at session-aligned times.

pub mod advisor;
pub mod bot;
pub mod config;
pub mod notifier;
pub mod session;
