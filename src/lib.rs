//! Turnstile - Per-Client Rate Limiting
//!
//! This crate implements an in-memory, per-client request rate limiter with
//! two interchangeable strategies (a lockstep-refilled token bucket and an
//! exact sliding window) and the HTTP middleware that turns a denial into a
//! `429 Too Many Requests` response.

pub mod config;
pub mod error;
pub mod logging;
pub mod ratelimit;
pub mod web;
