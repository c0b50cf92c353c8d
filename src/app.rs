use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::TaxonRow;
use crate::domain::{DataKind, MissingProteinIdPolicy, TaxonId};
use crate::error::KiraError;
use crate::extract::{ProteinExtractor, ProteinSet, parse_protein_records};
use crate::fasta;
use crate::fetch::{Downloader, FetchAction, ensure_local};
use crate::filter::{LongestProteins, longest_per_gene};
use crate::gff::{GffSummary, read_gff};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct TaxonResult {
    pub taxon: TaxonId,
    pub genome: FetchAction,
    pub gff: FetchAction,
    pub extracted_records: usize,
    pub skipped_records: usize,
    pub gff_summary: GffSummary,
    pub longest_proteins: usize,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub started_at: String,
    pub finished_at: String,
    pub taxa: Vec<TaxonResult>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<D: Downloader, X: ProteinExtractor> {
    store: Store,
    downloader: D,
    extractor: X,
    missing_protein_id: MissingProteinIdPolicy,
}

impl<D: Downloader, X: ProteinExtractor> App<D, X> {
    pub fn new(
        store: Store,
        downloader: D,
        extractor: X,
        missing_protein_id: MissingProteinIdPolicy,
    ) -> Self {
        Self {
            store,
            downloader,
            extractor,
            missing_protein_id,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn run(&self, rows: &[TaxonRow], sink: &dyn ProgressSink) -> Result<RunResult, KiraError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.store.ensure_root()?;
        let mut taxa = Vec::with_capacity(rows.len());
        for row in rows {
            taxa.push(self.process_taxon(row, sink)?);
        }
        Ok(RunResult {
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            taxa,
        })
    }

    pub fn process_taxon(
        &self,
        row: &TaxonRow,
        sink: &dyn ProgressSink,
    ) -> Result<TaxonResult, KiraError> {
        let taxon = &row.taxon;
        let start = Instant::now();
        sink.event(ProgressEvent::message(format!("Working on taxon: {taxon}")));

        let genome = self.fetch(taxon, DataKind::Genome, &row.genome_link, sink)?;
        let gff = self.fetch(taxon, DataKind::Gff, &row.gff_link, sink)?;

        let proteins = self.extract_proteins(taxon, sink)?;

        let index = read_gff(&self.store.gff_path(taxon))?;
        let gff_summary = index.summary();
        sink.event(ProgressEvent::message(format!(
            "\tSummary of gff file:\n\tprotein-coding genes: {}\tproteins: {}\tgene with multiple proteins: {}",
            gff_summary.protein_coding_genes, gff_summary.proteins, gff_summary.multi_protein_genes
        )));

        let longest = longest_per_gene(&proteins, &index)?;
        sink.event(ProgressEvent::message(format!(
            "\t{} longest proteins extracted",
            longest.len()
        )));

        let output_path = self.write_output(taxon, &longest)?;
        tracing::info!(%taxon, proteins = longest.len(), output = %output_path, "taxon done");
        sink.event(ProgressEvent {
            message: format!("\tWrote {output_path}"),
            elapsed: Some(start.elapsed()),
        });

        Ok(TaxonResult {
            taxon: taxon.clone(),
            genome,
            gff,
            extracted_records: proteins.records,
            skipped_records: proteins.skipped,
            gff_summary,
            longest_proteins: longest.len(),
            output_path,
        })
    }

    fn fetch(
        &self,
        taxon: &TaxonId,
        kind: DataKind,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<FetchAction, KiraError> {
        let label = kind.label();
        ensure_local(&self.store, &self.downloader, taxon, kind, url, |action| {
            let message = match action {
                FetchAction::AlreadyPresent => {
                    format!("\t{label} file already exists.\tSkipping download")
                }
                FetchAction::Decompressed => {
                    format!("\t{label} download already complete.\tneed to decompress")
                }
                FetchAction::Downloaded => format!("\t{label} download starting..."),
            };
            sink.event(ProgressEvent::message(message));
        })
    }

    fn extract_proteins(
        &self,
        taxon: &TaxonId,
        sink: &dyn ProgressSink,
    ) -> Result<ProteinSet, KiraError> {
        let genome = self.store.genome_path(taxon);
        let gff = self.store.gff_path(taxon);
        let text = self.extractor.extract(&genome, &gff)?;
        let proteins = parse_protein_records(&text, self.missing_protein_id)?;
        sink.event(ProgressEvent::message(format!(
            "\tNumber of <gffread> generated Protein sequences: {}",
            proteins.records
        )));
        if proteins.skipped > 0 {
            sink.event(ProgressEvent::message(format!(
                "\t{} records without protein_id skipped",
                proteins.skipped
            )));
        }
        Ok(proteins)
    }

    fn write_output(
        &self,
        taxon: &TaxonId,
        longest: &LongestProteins,
    ) -> Result<String, KiraError> {
        let path = self.store.output_path(taxon);
        let mut contents = Vec::new();
        fasta::write_records(
            &mut contents,
            longest.iter().map(|(id, seq)| (id.as_str(), seq.as_str())),
        )
        .map_err(|err| KiraError::Filesystem(format!("render {path}: {err}")))?;
        Store::write_file_atomic(&path, &contents)?;
        Ok(path.to_string())
    }
}
