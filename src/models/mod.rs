// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod session;
pub mod user;

pub use activity::{ActivityKind, ActivityRecord};
pub use session::{Credentials, Session, SessionNotice, SessionState, SignUpRequest};
pub use user::{ProfileUpdate, UserProfile};
