//! Gatekeeper - fixed-window admission control
//!
//! This crate decides, per caller and per named policy, whether a request may
//! proceed to a cost-bearing endpoint (AI generation, chat, email, ...). It
//! ships the limiter as a library with axum middleware, and as a small HTTP
//! admission service.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
