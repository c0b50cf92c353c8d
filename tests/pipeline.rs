use std::collections::BTreeSet;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use kira_proteome::app::{App, ProgressEvent, ProgressSink};
use kira_proteome::config::TaxonRow;
use kira_proteome::domain::{DataKind, MissingProteinIdPolicy, TaxonId};
use kira_proteome::error::KiraError;
use kira_proteome::extract::ProteinExtractor;
use kira_proteome::fasta::FastaReader;
use kira_proteome::fetch::{Downloader, FetchAction};
use kira_proteome::output::JsonOutput;
use kira_proteome::store::Store;

const GFF: &str = "\
##gff-version 3
NC_1\tRefSeq\tregion\t1\t9000\t.\t+\t.\tID=NC_1:1..9000
NC_1\tRefSeq\tgene\t1\t3000\t.\t+\t.\tID=gene-G1;Name=G1
NC_1\tRefSeq\tmRNA\t1\t3000\t.\t+\t.\tID=rna-T1;Parent=gene-G1
NC_1\tRefSeq\tCDS\t10\t310\t.\t+\t0\tID=cds-P1;Parent=rna-T1;protein_id=P1
NC_1\tRefSeq\tmRNA\t1\t3000\t.\t+\t.\tID=rna-T2;Parent=gene-G1
NC_1\tRefSeq\tCDS\t10\t460\t.\t+\t0\tID=cds-P2;Parent=rna-T2;protein_id=P2
NC_1\tRefSeq\tgene\t4000\t5000\t.\t-\t.\tID=gene-G2;Name=G2;gene_biotype=lncRNA
NC_1\tRefSeq\tgene\t6000\t7000\t.\t+\t.\tID=gene-G3;Name=G3
NC_1\tRefSeq\tmRNA\t6000\t7000\t.\t+\t.\tID=rna-T3;Parent=gene-G3
NC_1\tRefSeq\tCDS\t6010\t6100\t.\t+\t0\tID=cds-P3;Parent=rna-T3;protein_id=P3
";

fn extractor_output() -> String {
    format!(
        ">rna-T1 gene=gene-G1;protein_id=P1\n{}\n\
         >rna-T2 gene=gene-G1;protein_id=P2\n{}\n{}\n\
         >rna-T3 gene=gene-G3;protein_id=P3\nMKV.\n",
        "M".repeat(100),
        "A".repeat(75),
        "A".repeat(75),
    )
}

struct FailingDownloader;

impl Downloader for FailingDownloader {
    fn download(&self, url: &str, _destination: &Utf8Path) -> Result<(), KiraError> {
        Err(KiraError::Http(format!("unexpected download of {url}")))
    }
}

#[derive(Default)]
struct CannedExtractor {
    output: String,
    calls: Mutex<usize>,
}

impl ProteinExtractor for CannedExtractor {
    fn extract(&self, genome: &Utf8Path, gff: &Utf8Path) -> Result<String, KiraError> {
        assert!(genome.as_str().ends_with(".genome.fas"));
        assert!(gff.as_str().ends_with(".gff"));
        let mut guard = self.calls.lock().unwrap();
        *guard += 1;
        Ok(self.output.clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn prepared_store(taxon: &TaxonId) -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_root(root);
    std::fs::write(store.genome_path(taxon).as_std_path(), ">NC_1\nACGT\n").unwrap();
    std::fs::write(store.gff_path(taxon).as_std_path(), GFF).unwrap();
    (temp, store)
}

fn row(taxon: &TaxonId) -> TaxonRow {
    TaxonRow {
        taxon: taxon.clone(),
        genome_link: "https://example.org/genome.fna.gz".to_string(),
        gff_link: "https://example.org/genomic.gff.gz".to_string(),
    }
}

#[test]
fn longest_isoform_per_gene_is_written() {
    let taxon: TaxonId = "Test_taxon".parse().unwrap();
    let (_temp, store) = prepared_store(&taxon);
    let output_path = store.output_path(&taxon);
    std::fs::write(output_path.as_std_path(), ">stale\nMMMM\n").unwrap();
    let extractor = CannedExtractor {
        output: extractor_output(),
        ..Default::default()
    };
    let app = App::new(
        store,
        FailingDownloader,
        extractor,
        MissingProteinIdPolicy::Skip,
    );
    let sink = RecordingSink::default();

    let result = app.process_taxon(&row(&taxon), &sink).unwrap();

    assert_eq!(result.genome, FetchAction::AlreadyPresent);
    assert_eq!(result.gff, FetchAction::AlreadyPresent);
    assert_eq!(result.extracted_records, 3);
    assert_eq!(result.gff_summary.protein_coding_genes, 2);
    assert_eq!(result.gff_summary.proteins, 3);
    assert_eq!(result.gff_summary.multi_protein_genes, 1);
    assert_eq!(result.longest_proteins, 2);

    let text = std::fs::read_to_string(output_path.as_std_path()).unwrap();
    let written = FastaReader::new(text.as_bytes())
        .map(|record| {
            let record = record.unwrap();
            (record.id, record.sequence)
        })
        .collect::<BTreeSet<_>>();
    let expected = BTreeSet::from([
        ("P2".to_string(), "A".repeat(150)),
        ("P3".to_string(), "MKV*".to_string()),
    ]);
    assert_eq!(written, expected);
    assert_eq!(text.lines().count(), 4);

    let messages = sink.messages.lock().unwrap();
    assert_eq!(messages[0], "Working on taxon: Test_taxon");
    assert!(messages.iter().any(|m| m.contains("Genome file already exists")));
    assert!(messages.iter().any(|m| m.contains("2 longest proteins extracted")));
}

#[test]
fn progress_names_the_fetch_branch_taken() {
    let taxon: TaxonId = "Cached".parse().unwrap();
    let (_temp, store) = prepared_store(&taxon);
    let gff = store.gff_path(&taxon);
    std::fs::rename(
        gff.as_std_path(),
        store.compressed_path(&taxon, DataKind::Gff).as_std_path(),
    )
    .unwrap();
    let extractor = CannedExtractor {
        output: extractor_output(),
        ..Default::default()
    };
    let app = App::new(
        store,
        FailingDownloader,
        extractor,
        MissingProteinIdPolicy::Skip,
    );
    let sink = RecordingSink::default();

    let result = app.process_taxon(&row(&taxon), &sink).unwrap();
    assert_eq!(result.gff, FetchAction::Decompressed);
    assert!(gff.as_std_path().exists());

    let messages = sink.messages.lock().unwrap();
    let fetch_lines = messages
        .iter()
        .filter(|m| m.starts_with("\tGenome") || m.starts_with("\tGFF"))
        .collect::<Vec<_>>();
    assert_eq!(
        fetch_lines,
        [
            "\tGenome file already exists.\tSkipping download",
            "\tGFF download already complete.\tneed to decompress",
        ]
    );
}

#[test]
fn disagreeing_identifiers_abort_the_taxon() {
    let taxon: TaxonId = "Broken".parse().unwrap();
    let (_temp, store) = prepared_store(&taxon);
    let output_path = store.output_path(&taxon);
    let extractor = CannedExtractor {
        output: ">rna-T1 protein_id=P1\nMK\n".to_string(),
        ..Default::default()
    };
    let app = App::new(
        store,
        FailingDownloader,
        extractor,
        MissingProteinIdPolicy::Skip,
    );

    let err = app.process_taxon(&row(&taxon), &JsonOutput).unwrap_err();
    assert_matches!(err, KiraError::ProteinNotFound { ref gene, .. } if gene == "gene-G1");
    assert!(!output_path.as_std_path().exists());
}

#[test]
fn run_stops_at_first_failing_taxon() {
    let first: TaxonId = "First".parse().unwrap();
    let (_temp, store) = prepared_store(&first);
    let second: TaxonId = "Second".parse().unwrap();
    let third: TaxonId = "Third".parse().unwrap();
    std::fs::write(store.genome_path(&third).as_std_path(), ">NC_1\nACGT\n").unwrap();
    std::fs::write(store.gff_path(&third).as_std_path(), GFF).unwrap();
    let root = store.root().to_path_buf();
    let extractor = CannedExtractor {
        output: extractor_output(),
        ..Default::default()
    };
    let app = App::new(
        store,
        FailingDownloader,
        extractor,
        MissingProteinIdPolicy::Skip,
    );

    let rows = vec![row(&first), row(&second), row(&third)];
    let err = app.run(&rows, &JsonOutput).unwrap_err();
    assert_matches!(err, KiraError::Http(_));
    assert!(root.join("First.fas").as_std_path().exists());
    assert!(!root.join("Third.fas").as_std_path().exists());
    assert!(
        !app.store()
            .compressed_path(&second, DataKind::Genome)
            .as_std_path()
            .exists()
    );
}

#[test]
fn run_reports_every_taxon() {
    let taxon: TaxonId = "Only".parse().unwrap();
    let (_temp, store) = prepared_store(&taxon);
    let extractor = CannedExtractor {
        output: extractor_output(),
        ..Default::default()
    };
    let app = App::new(
        store,
        FailingDownloader,
        extractor,
        MissingProteinIdPolicy::Fail,
    );

    let result = app.run(&[row(&taxon)], &JsonOutput).unwrap();
    assert_eq!(result.taxa.len(), 1);
    assert_eq!(result.taxa[0].longest_proteins, 2);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["taxa"][0]["genome"], "already_present");
    assert_eq!(json["taxa"][0]["gff_summary"]["multi_protein_genes"], 1);
}
