//! ctxctl - controller extension protocol.
//!
//! The orchestrator delegates changes to a per-deployment AppContext document
//! to independently deployed controllers. This crate provides both sides of
//! that contract: service location, the AppContext document model, the
//! action/placement controller traits and their gRPC dispatch server, the
//! orchestrator-side client, and the policy service that turns events into
//! workflow triggers.

pub mod actor;
pub mod appcontext;
pub mod client;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod http;
pub mod intent;
pub mod policy;
pub mod proto;
pub mod sample;
pub mod server;
pub mod utils;
