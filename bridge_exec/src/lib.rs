//! # Navigation Bridge Library
//!
//! Components of the bridge between the navigation stack and web clients.

pub mod conn_mgr;
pub mod goal_client;
pub mod goal_dispatcher;
pub mod odom_sim;
pub mod params;
pub mod point_cloud;
pub mod route_catalog;
pub mod snapshot;
pub mod telem_client;
pub mod telem_store;
pub mod web;
