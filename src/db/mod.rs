mod sqlite;
mod types;

pub use sqlite::init_sqlite;
pub use types::SqliteConfig;
