//! Integration tests for spotbot-bot.
//!
//! These tests verify the interaction between components:
//! - User data stream lifecycle against a local WebSocket server
//! - Signal to order to execution report, end to end
//! - Graceful shutdown

pub mod common;
