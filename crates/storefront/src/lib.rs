//! Sdach Storefront library.
//!
//! Product listing, a session-backed cart, and checkout with a hosted
//! payment handoff. The binary in `main.rs` wires this into an HTTP server;
//! the library split lets the services be tested without one.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
