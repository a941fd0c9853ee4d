use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;
use crate::schema;

pub type ReadPool = r2d2::Pool<SqliteConnectionManager>;
pub type ReadConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Opens the bounded read pool against `path`, applying the shared pragmas
/// to every connection the pool hands out.
pub fn open_read_pool(path: &str, max_size: u32) -> Result<ReadPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        schema::apply_connection_pragmas(conn).map_err(|e| {
            rusqlite::Error::ModuleError(format!("failed to apply pragmas: {e}"))
        })?;
        Ok(())
    });
    let pool = r2d2::Pool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}

/// Opens the single writer connection and runs migrations against it.
pub fn open_writer_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    schema::apply_connection_pragmas(&conn)?;
    schema::migrate(&mut conn)?;
    Ok(conn)
}
