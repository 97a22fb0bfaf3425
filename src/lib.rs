//! Proven Pro Profile Platform API Library
//!
//! This library provides the core functionality for the Proven Pro freelancer
//! profile platform, including account auth, tiered profile storage, the
//! verification engine, the share/review token manager and subscription
//! billing state.
//!
//! # Modules
//!
//! - `auth`: Registration, login, Google sign-in, password reset, JWT extractors.
//! - `circuit_breaker`: Circuit breaker for outbound delivery calls.
//! - `config`: Configuration management and tier field lists.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and shared state.
//! - `models`: Core data models.
//! - `profile`: Tiered profile storage and search.
//! - `services`: External service clients (SMS, mail, Google, payments).
//! - `shares`: Share/review token manager.
//! - `subscription`: Subscription billing state.
//! - `verification`: Verification engine (facets, OTP, percentage).

pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod profile;
pub mod services;
pub mod shares;
pub mod subscription;
pub mod verification;
