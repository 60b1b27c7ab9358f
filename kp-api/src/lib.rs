//! keep-presence API - HTTP client for the Slack Web API.
//!
//! This crate covers the handful of Web API methods a presence keeper
//! needs: `auth.test`, `rtm.connect`, `users.getPresence` and
//! `users.setPresence`. Calls go through [`ApiClient`], and the
//! [`PresenceApi`] trait is the seam the connection manager and refresher
//! are written against.

pub mod client;
pub mod endpoints;
pub mod presence_api;
pub mod response;

// Re-export key types
pub use client::ApiClient;
pub use endpoints::auth::AuthIdentity;
pub use endpoints::presence::{Presence, PresenceMode, PresenceSnapshot, SetPresenceOutcome};
pub use endpoints::rtm::RtmConnectInfo;
pub use presence_api::PresenceApi;
pub use response::SlackResponse;
