use diesel::connection::set_default_instrumentation;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{Connection, PgConnection, RunQueryDsl};
use tracing::debug;

use crate::config::Config;
use crate::errors::Error;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Builds a connection pool against the database described by `config`. Called once per
/// pipeline invocation; the pool itself is passed around explicitly rather than stored in a
/// global (§4.3, §9).
pub fn get_pool(config: &Config) -> Result<PgPool, Error> {
    let manager = ConnectionManager::<PgConnection>::new(config.database.connection_url());
    let pool = Pool::builder().build(manager)?;
    Ok(pool)
}

/// Points every query issued on `conn` at `schema` for the remainder of the connection's
/// session. This is how the loader targets statically-declared, schema-unqualified diesel
/// tables (schema.rs) at either the staging or production namespace.
pub fn set_search_path(conn: &mut PgConnection, schema: &str) -> Result<(), Error> {
    diesel::sql_query(format!("SET search_path TO {}", quote_ident(schema))).execute(conn)?;
    Ok(())
}

/// Quotes a schema/table identifier that is under this program's control (never end-user
/// input) so it can be interpolated into DDL that diesel has no query-builder support for.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Installs process-wide query instrumentation: every statement diesel sends is logged at
/// debug level with its elapsed time. Call once from `main`.
pub fn install_instrumentation() {
    set_default_instrumentation(|| Some(Box::new(simple_logger) as Box<_>))
        .expect("database instrumentation must only be installed once");
}

fn simple_logger(event: diesel::connection::InstrumentationEvent<'_>) {
    use diesel::connection::InstrumentationEvent::*;
    match event {
        StartQuery { query, .. } => debug!(%query, "executing query"),
        FinishQuery { query, error: Some(err), .. } => debug!(%query, %err, "query failed"),
        FinishQuery { query, .. } => debug!(%query, "query finished"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_wraps_in_double_quotes() {
        assert_eq!(quote_ident("staging"), "\"staging\"");
    }

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }
}
