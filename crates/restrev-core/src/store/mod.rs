//! Local store layer
//!
//! Three logical tables (`restaurants`, `reviews`, `offline-queue`) of JSON
//! records over an embedded libSQL database.

mod connection;
mod libsql_store;
mod local;
mod migrations;
mod schema;

pub use connection::Database;
pub use libsql_store::LibSqlStore;
pub use local::{Cursor, LocalStore};
pub use migrations::CURRENT_VERSION;
pub use schema::{KeyGenerator, Keyed, StoreKey, Table, PROVISIONAL_PREFIX};
