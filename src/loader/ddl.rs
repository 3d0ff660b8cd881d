use crate::database::quote_ident;

/// Full DDL for one schema: the eight entity tables plus the two metadata tables. Every
/// statement is `IF NOT EXISTS` so the same DDL can be run against a brand-new staging schema
/// or, idempotently, against an existing production schema during delta finalize (§4.2).
pub fn table_ddl(schema: &str) -> Vec<String> {
    let s = quote_ident(schema);
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.proteins (
                primary_accession text PRIMARY KEY,
                uniprot_id text NOT NULL,
                protein_name text,
                ncbi_taxid integer,
                sequence_length integer NOT NULL,
                molecular_weight integer NOT NULL,
                created_date date,
                modified_date date,
                comments_data jsonb,
                features_data jsonb,
                db_references_data jsonb,
                evidence_data jsonb
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.sequences (
                primary_accession text PRIMARY KEY REFERENCES {s}.proteins (primary_accession) ON DELETE CASCADE,
                sequence text NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.taxonomy (
                ncbi_taxid integer PRIMARY KEY,
                scientific_name text NOT NULL,
                lineage text
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.accessions (
                protein_accession text NOT NULL REFERENCES {s}.proteins (primary_accession) ON DELETE CASCADE,
                secondary_accession text NOT NULL,
                PRIMARY KEY (protein_accession, secondary_accession)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.genes (
                protein_accession text NOT NULL REFERENCES {s}.proteins (primary_accession) ON DELETE CASCADE,
                gene_name text NOT NULL,
                is_primary boolean NOT NULL DEFAULT false,
                PRIMARY KEY (protein_accession, gene_name)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.keywords (
                protein_accession text NOT NULL REFERENCES {s}.proteins (primary_accession) ON DELETE CASCADE,
                keyword_id text NOT NULL,
                keyword_label text NOT NULL,
                PRIMARY KEY (protein_accession, keyword_id)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.protein_to_go (
                protein_accession text NOT NULL REFERENCES {s}.proteins (primary_accession) ON DELETE CASCADE,
                go_term_id text NOT NULL,
                PRIMARY KEY (protein_accession, go_term_id)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.protein_to_taxonomy (
                protein_accession text NOT NULL REFERENCES {s}.proteins (primary_accession) ON DELETE CASCADE,
                ncbi_taxid integer NOT NULL REFERENCES {s}.taxonomy (ncbi_taxid),
                PRIMARY KEY (protein_accession, ncbi_taxid)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.py_load_uniprot_metadata (
                version text PRIMARY KEY,
                release_date text,
                load_timestamp timestamptz NOT NULL,
                swissprot_entry_count integer NOT NULL,
                trembl_entry_count integer NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {s}.load_history (
                run_id uuid PRIMARY KEY,
                status text NOT NULL,
                mode text NOT NULL,
                dataset text NOT NULL,
                start_time timestamptz NOT NULL,
                end_time timestamptz,
                error_message text
            )"
        ),
    ]
}

/// Secondary indexes created once the staging schema is fully loaded (§4.2.1 step 1).
pub fn index_ddl(schema: &str) -> Vec<String> {
    let s = quote_ident(schema);
    vec![
        format!("CREATE INDEX IF NOT EXISTS proteins_ncbi_taxid_idx ON {s}.proteins (ncbi_taxid)"),
        format!("CREATE INDEX IF NOT EXISTS proteins_comments_data_idx ON {s}.proteins USING gin (comments_data)"),
        format!("CREATE INDEX IF NOT EXISTS proteins_features_data_idx ON {s}.proteins USING gin (features_data)"),
        format!("CREATE INDEX IF NOT EXISTS accessions_secondary_idx ON {s}.accessions (secondary_accession)"),
        format!("CREATE INDEX IF NOT EXISTS genes_gene_name_idx ON {s}.genes (gene_name)"),
        format!("CREATE INDEX IF NOT EXISTS protein_to_go_go_term_idx ON {s}.protein_to_go (go_term_id)"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ddl_quotes_the_schema_and_covers_every_table() {
        let statements = table_ddl("staging");
        assert_eq!(statements.len(), 10);
        assert!(statements.iter().all(|s| s.contains("\"staging\".")));
        assert!(statements.iter().any(|s| s.contains("\"staging\".proteins")));
        assert!(statements.iter().any(|s| s.contains("\"staging\".load_history")));
    }

    #[test]
    fn table_ddl_is_idempotent_and_cascades_child_deletes() {
        let statements = table_ddl("production");
        assert!(statements.iter().all(|s| s.contains("IF NOT EXISTS")));
        let genes = statements.iter().find(|s| s.contains(".genes")).unwrap();
        assert!(genes.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn index_ddl_targets_the_requested_schema() {
        let statements = index_ddl("my schema");
        assert!(statements.iter().all(|s| s.contains("\"my schema\".")));
    }
}
