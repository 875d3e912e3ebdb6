//! # Core Client
//!
//! Reliable request execution for mail accounts.
//!
//! ## Overview
//!
//! This crate stacks the account-facing network layers on top of the
//! credential machinery in `core-auth`:
//!
//! - [`AuthenticatedClient`] attaches bearer tokens, refreshes them on 401
//!   (exactly once per request) and retries transport failures within a
//!   budget.
//! - [`CallSerializer`] keeps one command in flight per mailbox, as mail
//!   protocols require.
//! - [`AccountSession`] assembles the stack per account from the host's
//!   [`CoreConfig`](core_runtime::config::CoreConfig) and hands out lazy
//!   [`MailboxSession`]s.
//!
//! ## Features
//!
//! - Single 401-refresh-retry cycle, never a refresh loop
//! - Transport retries only for unanswered requests; 5xx is a business
//!   outcome
//! - Strict FIFO per mailbox, parallelism across mailboxes
//! - Sign-out that tears down queues and wipes credentials

pub mod client;
pub mod error;
pub mod retry;
pub mod serializer;
pub mod session;

pub use client::AuthenticatedClient;
pub use error::{ClientError, Result};
pub use retry::{Backoff, Retrier, RetryDecision, RetryPolicy};
pub use serializer::CallSerializer;
pub use session::{AccountSession, MailboxId, MailboxSession};
