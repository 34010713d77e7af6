pub mod error;
pub mod memory;
pub mod reader;
pub mod sqlite;

pub use error::DataError;
pub use reader::DataReader;
pub use sqlite::MarketRecordStore;
