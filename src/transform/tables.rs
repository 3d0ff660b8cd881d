use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::Error;
use crate::models::{EntryRecords, TABLE_LOAD_ORDER};

/// Owns one gzipped, tab-delimited CSV writer per output table. There is exactly one instance
/// per transform run, and it is never shared across threads — it is the sole writer role
/// described in §4.1, responsible for the primary-accession and taxonomy dedup invariants.
pub struct TableWriters {
    dir: PathBuf,
    proteins: csv::Writer<GzEncoder<File>>,
    sequences: csv::Writer<GzEncoder<File>>,
    accessions: csv::Writer<GzEncoder<File>>,
    taxonomy: csv::Writer<GzEncoder<File>>,
    genes: csv::Writer<GzEncoder<File>>,
    keywords: csv::Writer<GzEncoder<File>>,
    protein_to_go: csv::Writer<GzEncoder<File>>,
    protein_to_taxonomy: csv::Writer<GzEncoder<File>>,

    seen_primary_accessions: HashSet<String>,
    seen_taxids: HashSet<i32>,

    pub rows_written: u64,
}

fn open(dir: &Path, table: &str) -> Result<csv::Writer<GzEncoder<File>>, Error> {
    let path = dir.join(format!("{table}.tsv.gz"));
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_writer(encoder))
}

impl TableWriters {
    pub fn create(dir: &Path) -> Result<TableWriters, Error> {
        let mut writers = TableWriters {
            dir: dir.to_path_buf(),
            proteins: open(dir, "proteins")?,
            sequences: open(dir, "sequences")?,
            accessions: open(dir, "accessions")?,
            taxonomy: open(dir, "taxonomy")?,
            genes: open(dir, "genes")?,
            keywords: open(dir, "keywords")?,
            protein_to_go: open(dir, "protein_to_go")?,
            protein_to_taxonomy: open(dir, "protein_to_taxonomy")?,
            seen_primary_accessions: HashSet::new(),
            seen_taxids: HashSet::new(),
            rows_written: 0,
        };
        writers.write_headers()?;
        Ok(writers)
    }

    fn write_headers(&mut self) -> Result<(), Error> {
        self.proteins.write_record([
            "primary_accession",
            "uniprot_id",
            "protein_name",
            "ncbi_taxid",
            "sequence_length",
            "molecular_weight",
            "created_date",
            "modified_date",
            "comments_data",
            "features_data",
            "db_references_data",
            "evidence_data",
        ])?;
        self.sequences.write_record(["primary_accession", "sequence"])?;
        self.accessions.write_record(["protein_accession", "secondary_accession"])?;
        self.taxonomy.write_record(["ncbi_taxid", "scientific_name", "lineage"])?;
        self.genes.write_record(["protein_accession", "gene_name", "is_primary"])?;
        self.keywords.write_record(["protein_accession", "keyword_id", "keyword_label"])?;
        self.protein_to_go.write_record(["protein_accession", "go_term_id"])?;
        self.protein_to_taxonomy.write_record(["protein_accession", "ncbi_taxid"])?;
        Ok(())
    }

    /// Writes one entry's worth of rows. Returns an error (without writing anything for this
    /// entry) if its primary accession has already been seen — the fatal duplicate-accession
    /// invariant (§3, §7).
    pub fn write_entry(&mut self, records: EntryRecords) -> Result<(), Error> {
        let Some(protein) = records.protein else { return Ok(()) };

        if !self.seen_primary_accessions.insert(protein.primary_accession.clone()) {
            return Err(Error::DuplicateAccession(protein.primary_accession));
        }

        self.proteins.write_record([
            protein.primary_accession.as_str(),
            protein.uniprot_id.as_str(),
            protein.protein_name.as_deref().unwrap_or(""),
            &opt_to_string(protein.ncbi_taxid),
            &protein.sequence_length.to_string(),
            &protein.molecular_weight.to_string(),
            protein.created_date.as_deref().unwrap_or(""),
            protein.modified_date.as_deref().unwrap_or(""),
            protein.comments_data.as_deref().unwrap_or(""),
            protein.features_data.as_deref().unwrap_or(""),
            protein.db_references_data.as_deref().unwrap_or(""),
            protein.evidence_data.as_deref().unwrap_or(""),
        ])?;

        if let Some(seq) = records.sequence {
            self.sequences.write_record([seq.primary_accession.as_str(), seq.sequence.as_str()])?;
        }

        for acc in records.accessions {
            self.accessions.write_record([acc.protein_accession.as_str(), acc.secondary_accession.as_str()])?;
        }

        if let Some(tax) = records.taxonomy {
            if self.seen_taxids.insert(tax.ncbi_taxid) {
                self.taxonomy.write_record([
                    tax.ncbi_taxid.to_string().as_str(),
                    tax.scientific_name.as_str(),
                    tax.lineage.as_deref().unwrap_or(""),
                ])?;
            }
        }

        for gene in records.genes {
            self.genes.write_record([
                gene.protein_accession.as_str(),
                gene.gene_name.as_str(),
                bool_str(gene.is_primary),
            ])?;
        }

        for kw in records.keywords {
            self.keywords.write_record([kw.protein_accession.as_str(), kw.keyword_id.as_str(), kw.keyword_label.as_str()])?;
        }

        for ptg in records.protein_to_go {
            self.protein_to_go.write_record([ptg.protein_accession.as_str(), ptg.go_term_id.as_str()])?;
        }

        if let Some(ptt) = records.protein_to_taxonomy {
            self.protein_to_taxonomy
                .write_record([ptt.protein_accession.as_str(), ptt.ncbi_taxid.to_string().as_str()])?;
        }

        self.rows_written += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<(), Error> {
        self.proteins.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.sequences.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.accessions.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.taxonomy.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.genes.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.keywords.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.protein_to_go.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        self.protein_to_taxonomy.into_inner().map_err(flush_err)?.finish()?.sync_all()?;
        Ok(())
    }

    /// Removes any table file this run produced, used when an error aborts the transform
    /// partway through so no partial TSVs are left behind for the loader to pick up.
    pub fn discard(&self) {
        for table in TABLE_LOAD_ORDER {
            let _ = std::fs::remove_file(self.dir.join(format!("{table}.tsv.gz")));
        }
    }
}

fn flush_err(err: csv::IntoInnerError<csv::Writer<GzEncoder<File>>>) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}

fn opt_to_string(v: Option<i32>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn bool_str(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::MultiGzDecoder;

    use super::*;
    use crate::models::ProteinRecord;

    fn sample_protein(primary_accession: &str) -> EntryRecords {
        EntryRecords {
            protein: Some(ProteinRecord {
                primary_accession: primary_accession.to_string(),
                uniprot_id: "TEST_HUMAN".to_string(),
                sequence_length: 5,
                molecular_weight: 500,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn read_gz(path: &std::path::Path) -> String {
        let mut text = String::new();
        MultiGzDecoder::new(File::open(path).unwrap()).read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn writes_header_row_for_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let writers = TableWriters::create(dir.path()).unwrap();
        writers.finish().unwrap();

        let proteins = read_gz(&dir.path().join("proteins.tsv.gz"));
        assert!(proteins.starts_with("primary_accession\tuniprot_id\tprotein_name"));

        let taxonomy = read_gz(&dir.path().join("taxonomy.tsv.gz"));
        assert_eq!(taxonomy.trim_end(), "ncbi_taxid\tscientific_name\tlineage");
    }

    #[test]
    fn duplicate_primary_accession_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut writers = TableWriters::create(dir.path()).unwrap();
        writers.write_entry(sample_protein("P12345")).unwrap();

        let err = writers.write_entry(sample_protein("P12345")).unwrap_err();
        assert!(matches!(err, Error::DuplicateAccession(ref acc) if acc == "P12345"));
    }

    #[test]
    fn duplicate_taxonomy_rows_are_deduplicated_at_write_time() {
        use crate::models::TaxonomyRecord;

        let dir = tempfile::tempdir().unwrap();
        let mut writers = TableWriters::create(dir.path()).unwrap();

        let mut first = sample_protein("P1");
        first.taxonomy = Some(TaxonomyRecord { ncbi_taxid: 9606, scientific_name: "Homo sapiens".to_string(), lineage: None });
        writers.write_entry(first).unwrap();

        let mut second = sample_protein("P2");
        second.taxonomy = Some(TaxonomyRecord { ncbi_taxid: 9606, scientific_name: "Homo sapiens".to_string(), lineage: None });
        writers.write_entry(second).unwrap();

        writers.finish().unwrap();

        let taxonomy = read_gz(&dir.path().join("taxonomy.tsv.gz"));
        assert_eq!(taxonomy.lines().count(), 2); // header + one deduplicated row
    }
}
