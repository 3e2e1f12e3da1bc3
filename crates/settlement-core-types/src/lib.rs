pub mod actor;
pub mod dispute;
pub mod error;
pub mod event;
pub mod ids;
pub mod ledger;
pub mod order;
pub mod outbox;

pub use actor::{Actor, ActorRole};
pub use dispute::{Dispute, DisputeStatus, Resolution};
pub use error::{ErrorCategory, OrderError, Result};
pub use event::OrderEvent;
pub use ids::{OrderId, PartyKind, PartyRef, TxHash};
pub use ledger::{EntryKind, LedgerEntry};
pub use order::{
    MinimalStatus, Order, OrderStatus, OrderType, PaymentDetails, PaymentMethod, SpreadPreference,
};
pub use outbox::{OutboxEnvelope, OutboxStatus};
