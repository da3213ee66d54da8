//! Library exports for kvgate, shared between the binary and tests.

pub mod config;
pub mod gate;
pub mod routes;
pub mod startup;
pub mod state;
