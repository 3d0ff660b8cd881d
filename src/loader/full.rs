use diesel::prelude::*;
use diesel::sql_query;
use tracing::instrument;
use uuid::Uuid;

use super::{ddl, Loader};
use crate::database::quote_ident;
use crate::errors::Error;

/// Full-load finalize: index + analyze staging, archive any existing production schema, then
/// rename staging into its place (§4.2.1). Readers must never observe a half-renamed schema,
/// so the archive-then-rename pair runs inside one transaction.
#[instrument(skip(loader))]
pub fn finalize_full_load(loader: &Loader) -> Result<(), Error> {
    let mut conn = loader.pool().get()?;

    for statement in ddl::index_ddl(&loader.staging_schema) {
        sql_query(statement).execute(&mut conn)?;
    }
    sql_query(format!("ANALYZE {}.proteins", quote_ident(&loader.staging_schema))).execute(&mut conn)?;
    sql_query(format!("ANALYZE {}.taxonomy", quote_ident(&loader.staging_schema))).execute(&mut conn)?;

    conn.transaction(|conn| {
        if loader.production_schema_exists()? {
            let archived = format!(
                "{}_old_{}_{}",
                loader.production_schema,
                chrono_like_timestamp(),
                &Uuid::new_v4().simple().to_string()[..8]
            );
            sql_query(format!(
                "ALTER SCHEMA {} RENAME TO {}",
                quote_ident(&loader.production_schema),
                quote_ident(&archived)
            ))
            .execute(conn)?;
        }

        sql_query(format!(
            "ALTER SCHEMA {} RENAME TO {}",
            quote_ident(&loader.staging_schema),
            quote_ident(&loader.production_schema)
        ))
        .execute(conn)?;

        for statement in ddl::table_ddl(&loader.production_schema) {
            sql_query(statement).execute(conn)?;
        }

        Ok::<(), Error>(())
    })?;

    Ok(())
}

/// A `YYYYMMDD_HHMMSS` timestamp for archived schema names; second precision is enough since
/// the trailing random suffix disambiguates same-second archives.
fn chrono_like_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_fifteen_digits_and_an_underscore() {
        let stamp = chrono_like_timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.chars().nth(8), Some('_'));
        assert!(stamp.chars().filter(|c| c.is_ascii_digit()).count() == 14);
    }
}
