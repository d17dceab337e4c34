//! # Route Catalog
//!
//! In-memory table of named routes. Routes keep the order in which they were first inserted.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    convert::TryFrom,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use comms_if::nav::Waypoint;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A named, ordered list of waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub waypoints: Vec<Waypoint>,
}

/// Initial route table, loaded from `routes.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutesParams {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Default)]
pub struct RouteCatalog {
    routes: RwLock<Vec<Route>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Route names cannot be empty")]
    EmptyName,

    #[error("No route named \"{0}\"")]
    NotFound(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RouteCatalog {
    /// Build a catalog from a list of routes. If a name appears more than once the later route
    /// replaces the earlier one, keeping the earlier position.
    pub fn from_routes(routes: Vec<Route>) -> Self {
        let catalog = Self::default();

        for route in routes {
            if let Err(e) = catalog.insert(route) {
                log::warn!("Skipping route from parameters: {}", e);
            }
        }

        catalog
    }

    /// Names of all routes in insertion order.
    pub fn list_names(&self) -> Vec<String> {
        self.read().iter().map(|r| r.name.clone()).collect()
    }

    /// Get the waypoints of a route.
    pub fn get(&self, name: &str) -> Option<Vec<Waypoint>> {
        self.read()
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.waypoints.clone())
    }

    /// Get the length of a route and the waypoint at `index`, from a single read of the catalog.
    ///
    /// Returns `None` if the route doesn't exist. The waypoint is `None` if `index` is out of
    /// range, including negative indices.
    pub fn lookup(&self, name: &str, index: i64) -> Option<(usize, Option<Waypoint>)> {
        self.read().iter().find(|r| r.name == name).map(|r| {
            let waypoint = usize::try_from(index)
                .ok()
                .and_then(|i| r.waypoints.get(i).copied());

            (r.waypoints.len(), waypoint)
        })
    }

    /// Insert a route. An existing route with the same name is replaced in place.
    pub fn insert(&self, route: Route) -> Result<(), CatalogError> {
        if route.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }

        let mut routes = self.write();
        match routes.iter_mut().find(|r| r.name == route.name) {
            Some(existing) => *existing = route,
            None => routes.push(route),
        }

        Ok(())
    }

    /// Remove a route, returning its waypoints.
    pub fn remove(&self, name: &str) -> Result<Vec<Waypoint>, CatalogError> {
        let mut routes = self.write();

        match routes.iter().position(|r| r.name == name) {
            Some(i) => Ok(routes.remove(i).waypoints),
            None => Err(CatalogError::NotFound(String::from(name))),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Route>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Route>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<RoutesParams> for RouteCatalog {
    fn from(params: RoutesParams) -> Self {
        Self::from_routes(params.routes)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
