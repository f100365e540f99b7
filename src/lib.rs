use diesel::r2d2::ConnectionManager;
use diesel::PgConnection;
use r2d2::Pool;

pub mod classify;
pub mod db;
pub mod error;
pub mod executor;
pub mod model;
pub mod schema;
pub mod settings;
pub mod validate;

pub use error::{OperationError, Result, WriteError};
pub use settings::Settings;
pub use validate::ValidationError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn build_pool(settings: &Settings) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = ConnectionManager::<PgConnection>::new(&settings.database_url);
    Pool::builder().max_size(settings.pool_size).build(manager)
}
