// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Odyssey session: sign-in state and daily activity tracking for the
//! eLearning client.
//!
//! This crate wraps an external auth/persistence backend (Firebase Auth and
//! Firestore) behind a [`SessionManager`] that caches the signed-in user's
//! session and profile, and detects the first login of each day.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

pub use error::{Result, SessionError};
pub use services::SessionManager;
