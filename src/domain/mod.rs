//! Core domain types and logic.

pub mod entity;
pub mod error;
pub mod identity;
pub mod models;
pub mod orm;
pub mod query;
pub mod registry;
pub mod schema;
pub mod sql_builder;
pub mod sql_enum;
pub mod value;
