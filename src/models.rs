use serde::{Deserialize, Serialize};

/// One row of `proteins`, as produced by the transformer and as read back from a TSV.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub primary_accession: String,
    pub uniprot_id: String,
    pub protein_name: Option<String>,
    pub ncbi_taxid: Option<i32>,
    pub sequence_length: i32,
    pub molecular_weight: i32,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub comments_data: Option<String>,
    pub features_data: Option<String>,
    pub db_references_data: Option<String>,
    pub evidence_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub primary_accession: String,
    pub sequence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessionRecord {
    pub protein_accession: String,
    pub secondary_accession: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyRecord {
    pub ncbi_taxid: i32,
    pub scientific_name: String,
    pub lineage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneRecord {
    pub protein_accession: String,
    pub gene_name: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub protein_accession: String,
    pub keyword_id: String,
    pub keyword_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteinToGoRecord {
    pub protein_accession: String,
    pub go_term_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteinToTaxonomyRecord {
    pub protein_accession: String,
    pub ncbi_taxid: i32,
}

/// Every entity a single parsed entry can yield. The writer fans these out to the
/// per-table TSV streams; there is no relational type here, just a bundle of rows.
#[derive(Debug, Clone, Default)]
pub struct EntryRecords {
    pub protein: Option<ProteinRecord>,
    pub sequence: Option<SequenceRecord>,
    pub accessions: Vec<AccessionRecord>,
    pub taxonomy: Option<TaxonomyRecord>,
    pub genes: Vec<GeneRecord>,
    pub keywords: Vec<KeywordRecord>,
    pub protein_to_go: Vec<ProteinToGoRecord>,
    pub protein_to_taxonomy: Option<ProteinToTaxonomyRecord>,
}

/// Release-level metadata as reported by the Acquirer (§6) and persisted by `update_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub version: String,
    pub release_date: Option<String>,
    pub swissprot_entry_count: i32,
    pub trembl_entry_count: i32,
}

/// Load mode requested on the command line / by the pipeline driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Full,
    Delta,
}

impl std::str::FromStr for LoadMode {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(LoadMode::Full),
            "delta" => Ok(LoadMode::Delta),
            other => Err(crate::errors::Error::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadMode::Full => write!(f, "full"),
            LoadMode::Delta => write!(f, "delta"),
        }
    }
}

/// Which source dataset(s) to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Swissprot,
    Trembl,
}

impl Dataset {
    pub fn xml_filename(&self) -> &'static str {
        match self {
            Dataset::Swissprot => "uniprot_sprot.xml.gz",
            Dataset::Trembl => "uniprot_trembl.xml.gz",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Swissprot => "swissprot",
            Dataset::Trembl => "trembl",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses the `--dataset` CLI value into the datasets to process, in load order.
pub fn resolve_datasets(value: &str) -> Result<Vec<Dataset>, crate::errors::Error> {
    match value.to_lowercase().as_str() {
        "swissprot" => Ok(vec![Dataset::Swissprot]),
        "trembl" => Ok(vec![Dataset::Trembl]),
        "all" => Ok(vec![Dataset::Swissprot, Dataset::Trembl]),
        other => Err(crate::errors::Error::InvalidDataset(other.to_string())),
    }
}

/// Fixed table load order shared by the pipeline driver and the Loader (§4.2.3).
pub const TABLE_LOAD_ORDER: &[&str] = &[
    "taxonomy",
    "proteins",
    "sequences",
    "accessions",
    "genes",
    "keywords",
    "protein_to_go",
    "protein_to_taxonomy",
];

/// Tables whose staging rows may be duplicated across parallel workers and which carry a
/// natural-key uniqueness constraint that deduplication must enforce before finalize.
pub const TABLES_WITH_UNIQUE_CONSTRAINTS: &[(&str, &str)] = &[("taxonomy", "ncbi_taxid")];

/// Child tables synced (delete-then-insert-ignore) during a delta merge (§4.2.2).
pub const DELTA_CHILD_TABLES: &[&str] = &[
    "accessions",
    "genes",
    "keywords",
    "protein_to_go",
    "protein_to_taxonomy",
];

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn resolve_datasets_handles_swissprot_trembl_and_all() {
        assert_eq!(resolve_datasets("swissprot").unwrap(), vec![Dataset::Swissprot]);
        assert_eq!(resolve_datasets("TREMBL").unwrap(), vec![Dataset::Trembl]);
        assert_eq!(resolve_datasets("all").unwrap(), vec![Dataset::Swissprot, Dataset::Trembl]);
    }

    #[test]
    fn resolve_datasets_rejects_unknown_value() {
        let err = resolve_datasets("bogus").unwrap_err();
        assert!(matches!(err, crate::errors::Error::InvalidDataset(ref v) if v == "bogus"));
    }

    #[test]
    fn load_mode_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!(LoadMode::from_str("Full").unwrap(), LoadMode::Full);
        assert_eq!(LoadMode::from_str("delta").unwrap(), LoadMode::Delta);
        assert!(LoadMode::from_str("partial").is_err());
    }

    #[test]
    fn dataset_xml_filename_matches_upstream_naming() {
        assert_eq!(Dataset::Swissprot.xml_filename(), "uniprot_sprot.xml.gz");
        assert_eq!(Dataset::Trembl.xml_filename(), "uniprot_trembl.xml.gz");
    }
}
