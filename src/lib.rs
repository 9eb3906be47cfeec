//! Screen recordings published to a personal cloud drive, with a small
//! metadata service that keeps their download URLs playable.

pub mod capture;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
