//! Broker adapters - pub/sub and presence set implementations.
//!
//! - `in_memory` - Single-process broker for tests and local runs
//! - `redis` - Redis PUBLISH/SUBSCRIBE and SET backed implementations

mod in_memory;
mod redis;

pub use in_memory::{InMemoryBroker, InMemoryPresenceStore, InMemorySubscription};
pub use self::redis::{RedisBroker, RedisPresenceStore, RedisSubscription};
