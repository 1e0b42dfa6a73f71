//! vendd — always-on marketplace code-fulfillment daemon.
//!
//! Polls a marketplace chat inbox, detects finalized purchases, allocates a
//! unique unused code per purchase inside a database transaction, replies in
//! the chat and fans out observability notifications.

pub mod allocator;
pub mod breaker;
pub mod config;
pub mod cookies;
pub mod marketplace;
pub mod notify;
pub mod poller;
pub mod processor;
pub mod provider;
pub mod retry;
pub mod storage;
pub mod text;
