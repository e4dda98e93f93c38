//! RateGuard - API Admission Control
//!
//! This crate implements an admission-control layer for HTTP APIs. Every
//! request is authenticated, charged against sliding-window budgets for its
//! identity and its network origin, and recorded to an audit log. Window
//! state lives in a shared counter store so that several instances enforce
//! the same limits.

pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
