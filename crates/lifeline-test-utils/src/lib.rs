// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lifeline integration tests.
//!
//! Provides a fully wired hub over a temp SQLite database and a session
//! double that captures server events, for fast deterministic tests without
//! a network listener.
//!
//! # Components
//!
//! - [`TestHarness`] - Hub, storage, and seeded users in a temp directory
//! - [`MockSession`] - A connected session with event capture

pub mod harness;
pub mod mock_session;

pub use harness::TestHarness;
pub use mock_session::MockSession;
