pub mod error;
pub mod ledger;
pub mod sqlite;

pub use error::StoreError;
pub use ledger::Ledger;
pub use sqlite::StateStore;
