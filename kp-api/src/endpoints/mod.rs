//! Web API method wrappers organized by method family.
//!
//! Each module provides typed methods on [`crate::ApiClient`] for a group of
//! related Slack Web API methods.

pub mod auth;
pub mod presence;
pub mod rtm;
