//! Product Counter
//!
//! This library provides the core functionality for the product-counter
//! service, which counts search results for batches of keywords against a
//! shop's product search API using a background job queue.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
