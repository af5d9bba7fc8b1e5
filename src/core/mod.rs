//! Core business logic - framework-agnostic point-of-sale operations.
//!
//! The cart and the report aggregator are pure and synchronous. The catalog, customer and
//! transaction modules talk to the database through `SeaORM`; analysis talks to an external
//! model over HTTP. Nothing in here knows about a user interface.

pub mod analysis;
pub mod cart;
pub mod catalog;
pub mod customer;
pub mod export;
pub mod report;
pub mod timestamp;
pub mod transaction;
