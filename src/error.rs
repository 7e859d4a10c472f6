//! Error handling (ambient). Per spec.md §7, the router has no recoverable
//! runtime errors in normal operation: programmer errors (e.g. constructing
//! a router with neither routing mode) are fatal assertions, and "no path"
//! is not an error at all (the route degrades instead). The only place a
//! recoverable `Result` is useful is at construction time, where a host
//! might plausibly pass a bad configuration and want to handle it instead
//! of crashing outright.

use std::fmt;

/// Construction-time misuse the router can report instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// `RoutingType` bitmask had neither `PolyLineRouting` nor
    /// `OrthogonalRouting` set (spec.md §6/§7).
    NoRoutingModeSelected,
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::NoRoutingModeSelected => {
                write!(f, "router must be constructed with at least one of PolyLineRouting or OrthogonalRouting")
            }
        }
    }
}

impl std::error::Error for RouterError {}

pub type Result<T> = std::result::Result<T, RouterError>;
