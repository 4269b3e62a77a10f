//! Client boundary layer for the Linework sketch service.
//!
//! Provides a typed REST client for the `/sketch` and `/upload`
//! endpoints, the presigned three-step upload flow, and a realtime
//! task-tracking layer: a WebSocket channel with exponential-backoff
//! reconnection, a task status cache, and a bounded polling fallback.

pub mod backoff;
pub mod cache;
pub mod channel;
pub mod config;
pub mod events;
pub mod messages;
pub mod poll;
pub mod rest;
pub mod tracker;
pub mod transport;
pub mod upload;
