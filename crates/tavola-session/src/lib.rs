#![forbid(unsafe_code)]
#![warn(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
//! Session primitives for Tavola administrative clients.
//!
//! Layout:
//! - `token.rs`: bearer claim inspection (expiry, subject)
//! - `store.rs`: durable key-value slots for credentials and list snapshots
//! - `session.rs`: the logged-out / logged-in / expired state machine
//! - `clock.rs`: injectable wall clock

pub mod clock;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use session::{SessionManager, SessionState};
pub use store::{
    CredentialStore, FileStore, KeyValueStore, MemoryStore, SnapshotCache, SnapshotKey,
};
pub use token::TokenClaims;
