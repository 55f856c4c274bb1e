//! Database layer: pool and user stores (PostgreSQL and in-memory).

mod memory;
mod pool;
mod repositories;

pub use memory::MemoryUserStore;
pub use pool::{create_pool, run_migrations, DbPool};
pub use repositories::{PgUserStore, UserStore};
