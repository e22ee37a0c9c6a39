pub mod connection;
pub mod migrations;
pub mod outbox;
pub mod queries;

pub use connection::Database;
pub use outbox::Outbox;
