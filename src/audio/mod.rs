//! # Audio Module
//!
//! Playback orchestration on top of a pool of remote audio nodes. Decoding and
//! streaming happen on the nodes; this module decides which node serves each
//! guild and keeps per-guild queue state consistent while node calls fail or
//! complete out of order.
//!
//! ## Architecture
//!
//! ### [`node`] - Node Pool
//! - Registered nodes, their connectivity and load statistics
//! - Healthy node selection with random fallback
//!
//! ### [`session`] / [`registry`] - Sessions
//! - One session per guild, bound to a single node at a time
//! - Per-guild FIFO locking and a dedicated track event consumer
//!
//! ### [`queue`] - Queue Management
//! - Pending tracks plus current track
//! - Repeat off / track / queue
//!
//! ### [`dispatch`] / [`manager`] - Requests
//! - Search result classification into queue and playback actions
//! - Exactly one notification per user request
//!
//! ### [`rest`] / [`socket`] / [`health`] - Node Transport
//! - Lavalink v4 REST client and event socket
//! - Periodic health polling

pub mod dispatch;
pub mod health;
pub mod manager;
pub mod node;
pub mod queue;
pub mod registry;
pub mod rest;
pub mod session;
pub mod socket;
pub mod track;
pub mod voice_guard;
