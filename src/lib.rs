//! gtauto: data-access core of a trading automation application.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].
//!
//! A [`domain::registry::Registry`] hands out one cached handle per
//! `(kind, id, environment)`. Database handles expose an
//! [`domain::orm::Orm`] that compiles [`domain::query::Query`] descriptors
//! against the static entity schemas in [`domain::models`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
