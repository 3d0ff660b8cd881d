mod ddl;
mod delta;
mod full;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use diesel::pg::CopyFormat;
use diesel::prelude::*;
use diesel::sql_query;
use flate2::bufread::MultiGzDecoder;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::database::{quote_ident, set_search_path, PgPool};
use crate::errors::{Error, LoadError};
use crate::models::{LoadMode, ReleaseInfo};
use crate::schema::{load_history, py_load_uniprot_metadata};
use crate::utils::new_load_spinner;

/// Owns the database connection pool and the staging/production schema names for one pipeline
/// invocation. Implements every public Loader operation from §4.2.
pub struct Loader {
    pool: PgPool,
    pub staging_schema: String,
    pub production_schema: String,
}

impl Loader {
    pub fn new(pool: PgPool, config: &Config) -> Loader {
        Loader {
            pool,
            staging_schema: config.staging_schema.clone(),
            production_schema: config.production_schema.clone(),
        }
    }

    fn connection(&self, schema: &str) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, Error> {
        let mut conn = self.pool.get()?;
        set_search_path(&mut conn, schema)?;
        Ok(conn)
    }

    /// Drops staging if present and recreates it empty with the full DDL (§4.2 op 1).
    #[instrument(skip(self))]
    pub fn initialize_schema(&self, _mode: LoadMode) -> Result<(), Error> {
        let mut conn = self.pool.get()?;
        sql_query(format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(&self.staging_schema))).execute(&mut conn)?;
        sql_query(format!("CREATE SCHEMA {}", quote_ident(&self.staging_schema))).execute(&mut conn)?;

        let mut conn = self.connection(&self.staging_schema)?;
        for statement in ddl::table_ddl(&self.staging_schema) {
            sql_query(statement).execute(&mut conn)?;
        }
        Ok(())
    }

    /// Streams a gzipped TSV file into the named staging table via `COPY FROM STDIN` (§4.2
    /// op 2, the "COPY contract"). One transaction per call.
    #[instrument(skip(self))]
    pub fn bulk_load(&self, file: &Path, table: &str) -> Result<u64, Error> {
        if !file.exists() {
            return Err(LoadError::MissingFile(file.to_path_buf()).into());
        }

        let bar = new_load_spinner(table);
        let raw = File::open(file)?;
        let mut reader = BufReader::new(MultiGzDecoder::new(BufReader::new(raw)));

        let mut header = String::new();
        reader.read_line(&mut header)?;
        if header.trim().is_empty() {
            return Err(LoadError::BadHeader { path: file.to_path_buf(), reason: "missing header row".to_string() }.into());
        }

        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;

        let mut conn = self.connection(&self.staging_schema)?;
        let rows = conn.transaction(|conn| copy_table(table, &body, conn))?;

        bar.finish_and_clear();
        Ok(rows as u64)
    }

    /// Removes duplicate staging rows by `key`, keeping the physically-first row (§4.2 op 3).
    #[instrument(skip(self))]
    pub fn deduplicate_staging(&self, table: &str, key: &str) -> Result<u64, Error> {
        let mut conn = self.connection(&self.staging_schema)?;
        let sql = format!(
            "WITH numbered_rows AS (
                SELECT ctid, row_number() OVER (PARTITION BY {key} ORDER BY ctid) AS rn
                FROM {table}
            )
            DELETE FROM {table}
            WHERE ctid IN (SELECT ctid FROM numbered_rows WHERE rn > 1)"
        );
        let removed = sql_query(sql).execute(&mut conn)?;
        Ok(removed as u64)
    }

    pub fn finalize(&self, mode: LoadMode) -> Result<(), Error> {
        match mode {
            LoadMode::Full => full::finalize_full_load(self),
            LoadMode::Delta => delta::finalize_delta_load(self),
        }
    }

    /// Truncates and repopulates the single-row metadata table (§4.2 op 5).
    #[instrument(skip(self))]
    pub fn update_metadata(&self, release: &ReleaseInfo) -> Result<(), Error> {
        let mut conn = self.connection(&self.production_schema)?;
        sql_query("TRUNCATE TABLE py_load_uniprot_metadata").execute(&mut conn)?;
        diesel::insert_into(py_load_uniprot_metadata::table)
            .values((
                py_load_uniprot_metadata::version.eq(&release.version),
                py_load_uniprot_metadata::release_date.eq(&release.release_date),
                py_load_uniprot_metadata::load_timestamp.eq(Utc::now()),
                py_load_uniprot_metadata::swissprot_entry_count.eq(release.swissprot_entry_count),
                py_load_uniprot_metadata::trembl_entry_count.eq(release.trembl_entry_count),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Appends one row to the durable run-history table (§4.2 op 6). A missing production
    /// schema is treated as "nothing to log", matching §7's failure-visibility rule.
    #[instrument(skip(self, error))]
    pub fn log_run(
        &self,
        run_id: Uuid,
        mode: LoadMode,
        dataset: &str,
        status: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<(), Error> {
        if !self.production_schema_exists()? {
            return Ok(());
        }

        let mut conn = self.connection(&self.production_schema)?;
        diesel::insert_into(load_history::table)
            .values((
                load_history::run_id.eq(run_id),
                load_history::status.eq(status),
                load_history::mode.eq(mode.to_string()),
                load_history::dataset.eq(dataset),
                load_history::start_time.eq(start),
                load_history::end_time.eq(end),
                load_history::error_message.eq(error),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Returns the currently loaded release version, or `None` if there is no production
    /// schema or metadata table yet (§4.2 op 7; a metadata-read miss is not an error).
    #[instrument(skip(self))]
    pub fn get_current_release_version(&self) -> Result<Option<String>, Error> {
        if !self.production_schema_exists()? {
            return Ok(None);
        }

        let mut conn = self.connection(&self.production_schema)?;
        let result = py_load_uniprot_metadata::table
            .select(py_load_uniprot_metadata::version)
            .order(py_load_uniprot_metadata::load_timestamp.desc())
            .first::<String>(&mut conn);

        match result {
            Ok(version) => Ok(Some(version)),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(err) => {
                // an undefined table inside an existing production schema is also a miss
                if is_undefined_table(&err) {
                    Ok(None)
                }
                else {
                    Err(err.into())
                }
            }
        }
    }

    /// Drops the staging schema, swallowing "does not exist" (§4.2 op 8). Always runs from the
    /// pipeline driver's cleanup path regardless of outcome.
    #[instrument(skip(self))]
    pub fn cleanup(&self) -> Result<(), Error> {
        let mut conn = self.pool.get()?;
        sql_query(format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(&self.staging_schema))).execute(&mut conn)?;
        Ok(())
    }

    pub(crate) fn production_schema_exists(&self) -> Result<bool, Error> {
        let mut conn = self.pool.get()?;
        let exists = diesel::dsl::sql::<diesel::sql_types::Bool>(&format!(
            "EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = '{}')",
            self.production_schema.replace('\'', "''")
        ))
        .get_result::<bool>(&mut conn)?;
        Ok(exists)
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Postgres reports a missing relation as SQLSTATE 42P01, which diesel surfaces as
/// `DatabaseErrorKind::Unknown` (it has no dedicated variant for it) with a message of the
/// form `relation "..." does not exist`. There's no typed SQLSTATE accessor on
/// `DatabaseErrorInformation`, so the message text is the only thing to match on.
fn is_undefined_table(err: &diesel::result::Error) -> bool {
    match err {
        diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::Unknown, info) => {
            info.message().contains("does not exist")
        }
        _ => false,
    }
}

/// Dispatches a COPY of `body` (the TSV file, header already stripped) into the named table.
/// The table names are exactly the fixed set from `TABLE_LOAD_ORDER`; each arm's column order
/// matches the corresponding `schema.rs` declaration, which in turn matches the transformer's
/// TSV header order, so no explicit column list needs to travel with the data.
fn copy_table(table: &str, body: &[u8], conn: &mut PgConnection) -> QueryResult<usize> {
    use crate::schema::*;

    macro_rules! copy {
        ($table:expr) => {
            diesel::copy_from($table)
                .from_raw_data($table, |copy| -> Result<(), diesel::result::Error> {
                    copy.write_all(body)
                        .map_err(|e| diesel::result::Error::SerializationError(Box::new(e)))
                })
                .with_format(CopyFormat::Csv)
                .with_delimiter('\t')
                .execute(conn)
        };
    }

    match table {
        "proteins" => copy!(proteins::table),
        "sequences" => copy!(sequences::table),
        "accessions" => copy!(accessions::table),
        "taxonomy" => copy!(taxonomy::table),
        "genes" => copy!(genes::table),
        "keywords" => copy!(keywords::table),
        "protein_to_go" => copy!(protein_to_go::table),
        "protein_to_taxonomy" => copy!(protein_to_taxonomy::table),
        other => panic!("no COPY target registered for table '{other}'"),
    }
}
