//! Implementations of the [`PubSubBackend`](super::transport::PubSubBackend) trait

pub mod memory;
pub mod redis;
