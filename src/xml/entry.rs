use crate::errors::ParseError;
use crate::models::{
    AccessionRecord, EntryRecords, GeneRecord, KeywordRecord, ProteinRecord, ProteinToGoRecord,
    ProteinToTaxonomyRecord, SequenceRecord, TaxonomyRecord,
};
use crate::profile::{Profile, STANDARD_COMMENT_TYPES};
use crate::xml::element::{encode_list_to_string, Element};

/// Extracts every entity this entry produces, per the field-extraction rules in §4.1.
/// Returns `Ok(None)` when the entry has no primary accession, matching the "drop entry
/// silently" rule rather than treating it as an error.
pub fn extract_entry(entry: &Element, profile: Profile) -> Result<Option<EntryRecords>, ParseError> {
    let mut accessions = entry.children_named("accession");
    let Some(primary) = accessions.next() else {
        return Ok(None);
    };
    let primary_accession = primary.text_trimmed().unwrap_or_default();
    if primary_accession.is_empty() {
        return Ok(None);
    }

    let secondary_accessions: Vec<AccessionRecord> = accessions
        .filter_map(|a| a.text_trimmed())
        .map(|secondary_accession| AccessionRecord {
            protein_accession: primary_accession.clone(),
            secondary_accession,
        })
        .collect();

    let uniprot_id = entry.child("name").and_then(Element::text_trimmed).unwrap_or_default();

    let protein_name = entry
        .child("protein")
        .and_then(|p| p.child("recommendedName"))
        .and_then(|n| n.child("fullName"))
        .and_then(Element::text_trimmed);

    let (sequence_length, molecular_weight, sequence_text) = match entry.child("sequence") {
        Some(seq) => {
            let length = parse_int_attr(seq, "length")?.unwrap_or(0);
            let mass = parse_int_attr(seq, "mass")?.unwrap_or(0);
            let text = seq.text_trimmed().map(|t| t.split_whitespace().collect::<String>());
            (length, mass, text)
        }
        None => (0, 0, None),
    };

    let created_date = entry.attr("created").map(|s| s.to_string());
    let modified_date = entry.attr("modified").map(|s| s.to_string());

    let organism = entry.child("organism");
    let ncbi_taxid = organism
        .and_then(|o| {
            o.children_named("dbReference")
                .find(|d| d.attr("type") == Some("NCBI Taxonomy"))
        })
        .and_then(|d| d.attr("id"))
        .and_then(|id| id.parse::<i32>().ok());

    let taxonomy = match (ncbi_taxid, organism) {
        (Some(taxid), Some(org)) => {
            let scientific_name = org
                .children_named("name")
                .find(|n| n.attr("type") == Some("scientific"))
                .or_else(|| org.children_named("name").next())
                .and_then(Element::text_trimmed)
                .unwrap_or_default();

            let lineage = org.child("lineage").map(|lin| {
                lin.children_named("taxon")
                    .filter_map(Element::text_trimmed)
                    .collect::<Vec<_>>()
                    .join(" > ")
            });

            Some(TaxonomyRecord { ncbi_taxid: taxid, scientific_name, lineage })
        }
        _ => None,
    };

    let protein_to_taxonomy = ncbi_taxid.map(|taxid| ProteinToTaxonomyRecord {
        protein_accession: primary_accession.clone(),
        ncbi_taxid: taxid,
    });

    let genes = extract_genes(entry, &primary_accession);

    let protein_to_go: Vec<ProteinToGoRecord> = entry
        .children_named("dbReference")
        .filter(|d| d.attr("type") == Some("GO"))
        .filter_map(|d| d.attr("id"))
        .map(|go_term_id| ProteinToGoRecord {
            protein_accession: primary_accession.clone(),
            go_term_id: go_term_id.to_string(),
        })
        .collect();

    let keywords: Vec<KeywordRecord> = entry
        .children_named("keyword")
        .filter_map(|k| {
            let id = k.attr("id")?.to_string();
            let label = k.text_trimmed()?;
            Some(KeywordRecord { protein_accession: primary_accession.clone(), keyword_id: id, keyword_label: label })
        })
        .collect();

    let all_comments: Vec<&Element> = entry.children_named("comment").collect();
    let comments: Vec<&Element> = match profile {
        Profile::Full => all_comments,
        Profile::Standard => all_comments
            .into_iter()
            .filter(|c| matches!(c.attr("type"), Some(t) if STANDARD_COMMENT_TYPES.contains(&t)))
            .collect(),
    };
    let comments_data = encode_list_to_string(&comments);

    let (features_data, db_references_data, evidence_data) = match profile {
        Profile::Full => {
            let features: Vec<&Element> = entry.children_named("feature").collect();
            let db_refs: Vec<&Element> = entry
                .children_named("dbReference")
                .filter(|d| !matches!(d.attr("type"), Some("GO") | Some("NCBI Taxonomy")))
                .collect();
            let mut evidence = Vec::new();
            collect_descendants(entry, "evidence", &mut evidence);

            (
                encode_list_to_string(&features),
                encode_list_to_string(&db_refs),
                encode_list_to_string(&evidence),
            )
        }
        Profile::Standard => (None, None, None),
    };

    let protein = ProteinRecord {
        primary_accession: primary_accession.clone(),
        uniprot_id,
        protein_name,
        ncbi_taxid,
        sequence_length,
        molecular_weight,
        created_date,
        modified_date,
        comments_data,
        features_data,
        db_references_data,
        evidence_data,
    };

    let sequence = sequence_text.map(|sequence| SequenceRecord { primary_accession: primary_accession.clone(), sequence });

    Ok(Some(EntryRecords {
        protein: Some(protein),
        sequence,
        accessions: secondary_accessions,
        taxonomy,
        genes,
        keywords,
        protein_to_go,
        protein_to_taxonomy,
    }))
}

fn extract_genes(entry: &Element, primary_accession: &str) -> Vec<GeneRecord> {
    let mut genes = Vec::new();
    for gene in entry.children_named("gene") {
        let mut seen_primary_in_this_gene = false;
        for name in gene.children_named("name") {
            let Some(gene_name) = name.text_trimmed() else { continue };
            let is_primary = match name.attr("type") {
                Some("primary") if !seen_primary_in_this_gene => {
                    seen_primary_in_this_gene = true;
                    true
                }
                Some("primary") => false,
                Some("synonym") | Some("ordered locus") => false,
                _ => continue,
            };
            genes.push(GeneRecord { protein_accession: primary_accession.to_string(), gene_name, is_primary });
        }
    }
    genes
}

fn collect_descendants<'a>(el: &'a Element, tag: &str, out: &mut Vec<&'a Element>) {
    for child in &el.children {
        if child.tag == tag {
            out.push(child);
        }
        collect_descendants(child, tag, out);
    }
}

fn parse_int_attr(el: &Element, name: &str) -> Result<Option<i32>, ParseError> {
    match el.attr(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| ParseError::InvalidValue { field: "sequence attribute", value: raw.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY_P12345: &str = r#"<entry created="2024-01-01" modified="2024-06-01">
        <accession>P12345</accession>
        <accession>Q9Y5Y5</accession>
        <name>TEST1_HUMAN</name>
        <protein><recommendedName><fullName>Test protein 1</fullName></recommendedName></protein>
        <gene>
            <name type="primary">TP1</name>
            <name type="synonym">TP1A</name>
        </gene>
        <organism>
            <name type="scientific">Homo sapiens</name>
            <dbReference type="NCBI Taxonomy" id="9606"/>
            <lineage><taxon>Eukaryota</taxon><taxon>Metazoa</taxon><taxon>Chordata</taxon></lineage>
        </organism>
        <comment type="function"><text>Does something important.</text></comment>
        <comment type="similarity"><text>Belongs to a family.</text></comment>
        <dbReference type="GO" id="GO:0005515"/>
        <dbReference type="PDB" id="1ABC"/>
        <keyword id="KW-0181">Complete proteome</keyword>
        <feature type="chain" description="Test protein 1"/>
        <sequence length="10" mass="1111">MTESTSEQAA</sequence>
    </entry>"#;

    #[test]
    fn extracts_primary_and_secondary_accessions() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let records = extract_entry(&entry, Profile::Full).unwrap().unwrap();
        let protein = records.protein.unwrap();
        assert_eq!(protein.primary_accession, "P12345");
        assert_eq!(protein.uniprot_id, "TEST1_HUMAN");
        assert_eq!(protein.protein_name.as_deref(), Some("Test protein 1"));
        assert_eq!(records.accessions.len(), 1);
        assert_eq!(records.accessions[0].secondary_accession, "Q9Y5Y5");
    }

    #[test]
    fn entry_without_accession_is_dropped_silently() {
        let entry = Element::parse(b"<entry><name>NOPE</name></entry>").unwrap();
        let result = extract_entry(&entry, Profile::Standard).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn sequence_whitespace_is_stripped_and_length_mass_parsed() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let records = extract_entry(&entry, Profile::Full).unwrap().unwrap();
        let sequence = records.sequence.unwrap();
        assert_eq!(sequence.sequence, "MTESTSEQAA");
        assert_eq!(records.protein.unwrap().sequence_length, 10);
    }

    #[test]
    fn taxonomy_and_protein_to_taxonomy_share_the_same_taxid() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let records = extract_entry(&entry, Profile::Full).unwrap().unwrap();
        let taxonomy = records.taxonomy.unwrap();
        assert_eq!(taxonomy.ncbi_taxid, 9606);
        assert_eq!(taxonomy.scientific_name, "Homo sapiens");
        assert_eq!(taxonomy.lineage.as_deref(), Some("Eukaryota > Metazoa > Chordata"));
        assert_eq!(records.protein_to_taxonomy.unwrap().ncbi_taxid, 9606);
    }

    #[test]
    fn only_first_primary_gene_name_in_an_element_stays_primary() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let records = extract_entry(&entry, Profile::Full).unwrap().unwrap();
        assert_eq!(records.genes.len(), 2);
        assert!(records.genes[0].is_primary);
        assert!(!records.genes[1].is_primary);
    }

    #[test]
    fn gene_name_types_other_than_primary_synonym_or_ordered_locus_are_dropped() {
        let xml = br#"<entry>
            <accession>P99999</accession>
            <gene>
                <name type="primary">ABC1</name>
                <name type="ordered locus">AT1G01010</name>
                <name type="ORF">T1N6.1</name>
            </gene>
        </entry>"#;
        let entry = Element::parse(xml).unwrap();
        let records = extract_entry(&entry, Profile::Full).unwrap().unwrap();
        assert_eq!(records.genes.len(), 2);
        assert_eq!(records.genes[0].gene_name, "ABC1");
        assert!(records.genes[0].is_primary);
        assert_eq!(records.genes[1].gene_name, "AT1G01010");
        assert!(!records.genes[1].is_primary);
    }

    #[test]
    fn go_references_are_separated_from_other_db_references() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let records = extract_entry(&entry, Profile::Full).unwrap().unwrap();
        assert_eq!(records.protein_to_go.len(), 1);
        assert_eq!(records.protein_to_go[0].go_term_id, "GO:0005515");

        let db_refs = records.protein.unwrap().db_references_data.unwrap();
        assert!(db_refs.contains("PDB"));
        assert!(!db_refs.contains("GO:0005515"));
    }

    #[test]
    fn standard_profile_keeps_only_allowed_comment_types_and_nulls_other_blobs() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let records = extract_entry(&entry, Profile::Standard).unwrap().unwrap();
        let protein = records.protein.unwrap();

        let comments = protein.comments_data.unwrap();
        assert!(comments.contains("function"));
        assert!(!comments.contains("similarity"));

        assert!(protein.features_data.is_none());
        assert!(protein.db_references_data.is_none());
        assert!(protein.evidence_data.is_none());
    }

    #[test]
    fn full_profile_comments_are_a_superset_of_standard_profile_comments() {
        let entry = Element::parse(ENTRY_P12345.as_bytes()).unwrap();
        let full = extract_entry(&entry, Profile::Full).unwrap().unwrap().protein.unwrap();
        let standard = extract_entry(&entry, Profile::Standard).unwrap().unwrap().protein.unwrap();

        let full_comments = full.comments_data.unwrap();
        assert!(full_comments.contains("similarity"));
        assert!(full.features_data.is_some());
        assert!(standard.features_data.is_none());
    }

    #[test]
    fn missing_organism_yields_no_taxonomy_rows() {
        let entry = Element::parse(
            br#"<entry><accession>P99999</accession><name>NOTAX</name><sequence length="3" mass="99">ABC</sequence></entry>"#,
        )
        .unwrap();
        let records = extract_entry(&entry, Profile::Standard).unwrap().unwrap();
        assert!(records.taxonomy.is_none());
        assert!(records.protein_to_taxonomy.is_none());
        assert_eq!(records.protein.unwrap().ncbi_taxid, None);
    }
}
