// Table declarations are intentionally schema-unqualified: every connection pinned to this
// pool issues `SET search_path TO <schema>` before running diesel queries (see database.rs),
// so the same statically-typed tables can target either the staging or production schema.

diesel::table! {
    proteins (primary_accession) {
        primary_accession -> Text,
        uniprot_id -> Text,
        protein_name -> Nullable<Text>,
        ncbi_taxid -> Nullable<Int4>,
        sequence_length -> Int4,
        molecular_weight -> Int4,
        created_date -> Nullable<Date>,
        modified_date -> Nullable<Date>,
        comments_data -> Nullable<Jsonb>,
        features_data -> Nullable<Jsonb>,
        db_references_data -> Nullable<Jsonb>,
        evidence_data -> Nullable<Jsonb>,
    }
}

diesel::table! {
    sequences (primary_accession) {
        primary_accession -> Text,
        sequence -> Text,
    }
}

diesel::table! {
    accessions (protein_accession, secondary_accession) {
        protein_accession -> Text,
        secondary_accession -> Text,
    }
}

diesel::table! {
    taxonomy (ncbi_taxid) {
        ncbi_taxid -> Int4,
        scientific_name -> Text,
        lineage -> Nullable<Text>,
    }
}

diesel::table! {
    genes (protein_accession, gene_name) {
        protein_accession -> Text,
        gene_name -> Text,
        is_primary -> Bool,
    }
}

diesel::table! {
    keywords (protein_accession, keyword_id) {
        protein_accession -> Text,
        keyword_id -> Text,
        keyword_label -> Text,
    }
}

diesel::table! {
    protein_to_go (protein_accession, go_term_id) {
        protein_accession -> Text,
        go_term_id -> Text,
    }
}

diesel::table! {
    protein_to_taxonomy (protein_accession, ncbi_taxid) {
        protein_accession -> Text,
        ncbi_taxid -> Int4,
    }
}

diesel::table! {
    py_load_uniprot_metadata (version) {
        version -> Text,
        release_date -> Nullable<Text>,
        load_timestamp -> Timestamptz,
        swissprot_entry_count -> Int4,
        trembl_entry_count -> Int4,
    }
}

diesel::table! {
    load_history (run_id) {
        run_id -> Uuid,
        status -> Text,
        mode -> Text,
        dataset -> Text,
        start_time -> Timestamptz,
        end_time -> Nullable<Timestamptz>,
        error_message -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    proteins,
    sequences,
    accessions,
    taxonomy,
    genes,
    keywords,
    protein_to_go,
    protein_to_taxonomy,
    py_load_uniprot_metadata,
    load_history,
);
