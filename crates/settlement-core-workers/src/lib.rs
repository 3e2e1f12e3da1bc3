pub mod outbox;
pub mod sweeper;

pub use outbox::OutboxWorkerConfig;
pub use sweeper::SweeperConfig;
