// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - auth providers and the session manager.

pub mod auth_provider;
pub mod firebase_auth;
pub mod memory_auth;
pub mod session_manager;

pub use auth_provider::{AuthEvent, AuthProvider};
pub use firebase_auth::FirebaseAuth;
pub use memory_auth::MemoryAuth;
pub use session_manager::SessionManager;
