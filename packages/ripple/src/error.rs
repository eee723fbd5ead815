//! Errors returned while building a world or loading its settings.

use thiserror::Error;

/// Errors which prevent a world from being constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// No component lookup table was supplied.
    #[error("no components lookup was supplied to the world builder")]
    MissingLookup,

    /// The world was built without any systems.
    #[error("a world requires at least one system")]
    NoSystems,

    /// A system requires another system which was never registered.
    #[error("system {system} requires {requires}, which is not registered")]
    MissingDependency {
        system: &'static str,
        requires: &'static str,
    },

    /// A system requires another system which is registered after it.
    #[error("system {system} requires {requires}, which must be registered before it")]
    DependencyOrder {
        system: &'static str,
        requires: &'static str,
    },

    /// The same system type was registered twice.
    #[error("system {0} is registered more than once")]
    DuplicateSystem(&'static str),
}

/// Errors loading `WorldSettings`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}
