//! cadence-sweep: the periodic sweep runtime around cadence-core, with the
//! injected collaborator traits (clock, delivery, materialization, stores)
//! and in-memory implementations for tests and embedded hosts.

pub mod clock;
pub mod delivery;
pub mod error;
pub mod materializer;
pub mod store;
pub mod sweep;
pub mod webhook;

pub use clock::{Clock, FixedClock, SystemClock};
pub use delivery::{ConsoleDelivery, Delivery, DeliveryOutcome};
pub use error::{MaterializeError, StoreError, SweepError};
pub use materializer::{Materializer, MemoryLedger, TransactionRef, TransactionStatus};
pub use store::{MemoryStore, NotificationStore, ObligationStore};
pub use sweep::{SweepConfig, SweepStats, Sweeper};
pub use webhook::WebhookDelivery;
