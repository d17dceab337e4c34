//! # Communications interface crate.
//!
//! Provides the message definitions exchanged with the navigation stack and the web client, and
//! the network abstractions used to reach the navigation stack.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Navigation messages: poses, waypoints and goals
pub mod nav;

/// Telemetry messages: maps, point clouds and the snapshots streamed to clients
pub mod telem;

/// Network module
pub mod net;
