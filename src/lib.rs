//! Kaspa Arena auth backend
//!
//! Wallet-based login for the game front end: nonce challenges, Kaspa
//! Schnorr signature verification, and JWT bearer tokens.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
