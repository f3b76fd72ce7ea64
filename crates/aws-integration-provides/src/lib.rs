//! AWS integration interface, provides side
//!
//! Used by the integrator charm to collect cloud-capability requests
//! (instance tagging, load balancer management, object storage access, ...)
//! from the charms related to it, and to acknowledge them once handled.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                Host dispatcher                   │
//! │     (sets endpoint.<name>.changed / departed)    │
//! └─────────────────┬───────────────────────────────┘
//!                   │ dispatch()
//! ┌─────────────────▼───────────────────────────────┐
//! │             IntegrationProvides                  │
//! │  check_requests · cleanup · requests · ...       │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  IntegrationRequest (hash + accessors)    │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────┬───────┘
//!         │                 │               │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌─────▼───────┐
//! │ Relation      │ │ KeyValueStore │ │ FlagStore   │
//! │ Transport     │ │ (acks)        │ │             │
//! └───────────────┘ └───────────────┘ └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use aws_integration_provides::{
//!     IntegrationProvides, MemoryFlags, MemoryStore, MemoryTransport, RemoteUnit,
//! };
//! use serde_json::json;
//!
//! let mut transport = MemoryTransport::new();
//! let received = json!({"requested": true, "instance-id": "i-1", "region": "us-east-1"});
//! transport.join(RemoteUnit::new("aws:0", "worker/0", received.as_object().cloned().unwrap()));
//! let mut kv = MemoryStore::new();
//! let mut flags = MemoryFlags::new();
//!
//! let mut aws = IntegrationProvides::new("aws", &mut transport, &mut kv, &mut flags);
//! for request in aws.requests().unwrap() {
//!     // tag instances, grant access, ...
//!     aws.mark_completed(&request).unwrap();
//! }
//! assert!(aws.requests().unwrap().is_empty());
//! ```

pub mod endpoint;
pub mod error;
pub mod flags;
pub mod hash;
pub mod relation;
pub mod request;
pub mod store;

// Re-exports
pub use endpoint::{IntegrationProvides, Reaction, UnitInstance};
pub use error::{IntegrationError, Result};
pub use flags::{FlagStore, MemoryFlags};
pub use hash::content_hash;
pub use relation::{MemoryTransport, RelationTransport, RemoteUnit};
pub use request::{COMPLETED_KEY, Capability, IntegrationRequest, RequestStatus};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreDocument};
