pub mod db;
pub mod store;

pub use db::{from_db_timestamp, to_db_timestamp, SignalDb};
pub use store::SqliteSignalStore;
