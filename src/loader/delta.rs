use diesel::prelude::*;
use diesel::sql_query;
use tracing::instrument;

use super::{ddl, Loader};
use crate::database::quote_ident;
use crate::errors::Error;
use crate::models::DELTA_CHILD_TABLES;

/// Delta-load finalize: upsert the parent tables, sync each child table to staging's set for
/// the proteins it touches, then tombstone-delete proteins that disappeared entirely (§4.2.2).
/// Runs in one transaction so a failure at any step leaves production untouched.
#[instrument(skip(loader))]
pub fn finalize_delta_load(loader: &Loader) -> Result<(), Error> {
    let mut conn = loader.pool().get()?;
    let prod = quote_ident(&loader.production_schema);
    let staging = quote_ident(&loader.staging_schema);

    // The schema/DDL-ensure step must share the merge's transaction: if production doesn't
    // exist yet and a later step fails, we must not be left with a freshly-created but
    // otherwise empty production schema.
    conn.transaction(|conn| {
        sql_query(format!("CREATE SCHEMA IF NOT EXISTS {prod}")).execute(conn)?;
        for statement in ddl::table_ddl(&loader.production_schema) {
            sql_query(statement).execute(conn)?;
        }

        upsert_parents(conn, &prod, &staging)?;
        for table in DELTA_CHILD_TABLES {
            sync_child_table(conn, &prod, &staging, table)?;
        }
        delete_removed_proteins(conn, &prod, &staging)?;
        Ok::<(), Error>(())
    })?;

    sql_query(format!("ANALYZE {prod}.proteins")).execute(&mut conn)?;
    sql_query(format!("ANALYZE {prod}.sequences")).execute(&mut conn)?;
    sql_query(format!("ANALYZE {prod}.taxonomy")).execute(&mut conn)?;

    Ok(())
}

fn upsert_parents(conn: &mut PgConnection, prod: &str, staging: &str) -> Result<(), Error> {
    sql_query(format!(
        "INSERT INTO {prod}.proteins
            (primary_accession, uniprot_id, protein_name, ncbi_taxid, sequence_length, molecular_weight,
             created_date, modified_date, comments_data, features_data, db_references_data, evidence_data)
         SELECT primary_accession, uniprot_id, protein_name, ncbi_taxid, sequence_length, molecular_weight,
                created_date, modified_date, comments_data, features_data, db_references_data, evidence_data
         FROM {staging}.proteins
         ON CONFLICT (primary_accession) DO UPDATE SET
            uniprot_id = EXCLUDED.uniprot_id,
            protein_name = EXCLUDED.protein_name,
            ncbi_taxid = EXCLUDED.ncbi_taxid,
            sequence_length = EXCLUDED.sequence_length,
            molecular_weight = EXCLUDED.molecular_weight,
            created_date = EXCLUDED.created_date,
            modified_date = EXCLUDED.modified_date,
            comments_data = EXCLUDED.comments_data,
            features_data = EXCLUDED.features_data,
            db_references_data = EXCLUDED.db_references_data,
            evidence_data = EXCLUDED.evidence_data"
    ))
    .execute(conn)?;

    sql_query(format!(
        "INSERT INTO {prod}.sequences (primary_accession, sequence)
         SELECT primary_accession, sequence FROM {staging}.sequences
         ON CONFLICT (primary_accession) DO UPDATE SET sequence = EXCLUDED.sequence"
    ))
    .execute(conn)?;

    sql_query(format!(
        "INSERT INTO {prod}.taxonomy (ncbi_taxid, scientific_name, lineage)
         SELECT ncbi_taxid, scientific_name, lineage FROM {staging}.taxonomy
         ON CONFLICT (ncbi_taxid) DO UPDATE SET
            scientific_name = EXCLUDED.scientific_name,
            lineage = EXCLUDED.lineage"
    ))
    .execute(conn)?;

    Ok(())
}

/// Makes `production.{table}`'s rows for every protein present in `staging.proteins` exactly
/// match `staging.{table}`'s rows for that protein, leaving untouched proteins' children alone.
fn sync_child_table(conn: &mut PgConnection, prod: &str, staging: &str, table: &str) -> Result<(), Error> {
    let key_columns = composite_key_columns(table);
    let join_on = key_columns
        .iter()
        .map(|c| format!("p.{c} = s.{c}"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let columns = all_columns(table).join(", ");

    sql_query(format!(
        "DELETE FROM {prod}.{table} p
         USING {staging}.proteins sp
         WHERE p.protein_accession = sp.primary_accession
           AND NOT EXISTS (
               SELECT 1 FROM {staging}.{table} s WHERE {join_on}
           )"
    ))
    .execute(conn)?;

    sql_query(format!(
        "INSERT INTO {prod}.{table} ({columns})
         SELECT {columns} FROM {staging}.{table}
         ON CONFLICT DO NOTHING"
    ))
    .execute(conn)?;

    Ok(())
}

fn composite_key_columns(table: &str) -> Vec<&'static str> {
    match table {
        "accessions" => vec!["protein_accession", "secondary_accession"],
        "genes" => vec!["protein_accession", "gene_name"],
        "keywords" => vec!["protein_accession", "keyword_id"],
        "protein_to_go" => vec!["protein_accession", "go_term_id"],
        "protein_to_taxonomy" => vec!["protein_accession", "ncbi_taxid"],
        other => panic!("no composite key registered for child table '{other}'"),
    }
}

fn all_columns(table: &str) -> Vec<&'static str> {
    match table {
        "accessions" => vec!["protein_accession", "secondary_accession"],
        "genes" => vec!["protein_accession", "gene_name", "is_primary"],
        "keywords" => vec!["protein_accession", "keyword_id", "keyword_label"],
        "protein_to_go" => vec!["protein_accession", "go_term_id"],
        "protein_to_taxonomy" => vec!["protein_accession", "ncbi_taxid"],
        other => panic!("no column list registered for child table '{other}'"),
    }
}

fn delete_removed_proteins(conn: &mut PgConnection, prod: &str, staging: &str) -> Result<(), Error> {
    sql_query(format!(
        "DELETE FROM {prod}.proteins p
         WHERE NOT EXISTS (
             SELECT 1 FROM {staging}.proteins s WHERE s.primary_accession = p.primary_accession
         )"
    ))
    .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genes_carries_is_primary_in_its_column_list_but_not_its_key() {
        let key = composite_key_columns("genes");
        let columns = all_columns("genes");
        assert!(!key.contains(&"is_primary"));
        assert!(columns.contains(&"is_primary"));
    }

    #[test]
    fn every_delta_child_table_has_matching_key_and_column_registrations() {
        for table in DELTA_CHILD_TABLES {
            let key = composite_key_columns(table);
            let columns = all_columns(table);
            assert!(key.iter().all(|c| columns.contains(c)), "table {table} column list must be a superset of its key");
        }
    }
}
