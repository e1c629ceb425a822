pub mod aggregator;
pub mod badge;
pub mod lifecycle;
pub mod pending;
pub mod watch;
