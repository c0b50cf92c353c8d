use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{MissingProteinIdPolicy, TaxonId};
use crate::error::KiraError;

pub const TAXON_COLUMN: &str = "Taxon";
pub const GENOME_COLUMN: &str = "Genome_link";
pub const GFF_COLUMN: &str = "GFF_link";

pub const GFFREAD_ENV: &str = "KIRA_GFFREAD";

const CANDIDATE_DELIMITERS: [u8; 5] = [b',', b'\t', b';', b'|', b' '];
const SNIFF_LINES: usize = 20;

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Taxon")]
    taxon: String,
    #[serde(rename = "Genome_link")]
    genome_link: String,
    #[serde(rename = "GFF_link")]
    gff_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonRow {
    pub taxon: TaxonId,
    pub genome_link: String,
    pub gff_link: String,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub infile: Utf8PathBuf,
    pub workdir: Option<Utf8PathBuf>,
    pub gffread: Option<PathBuf>,
    pub missing_protein_id: MissingProteinIdPolicy,
    pub json: bool,
}

impl RunConfig {
    pub fn resolve_gffread(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| {
            std::env::var_os(GFFREAD_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }
}

/// Picks the delimiter that splits every sampled line into the same, non-zero number of
/// fields. Delimiters inside double quotes are not counted. Prefers more fields, then
/// earlier candidates.
pub fn detect_delimiter(text: &str) -> Option<u8> {
    let lines: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if lines.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    for delimiter in CANDIDATE_DELIMITERS {
        let mut counts = lines
            .iter()
            .map(|line| count_unquoted(line, delimiter));
        let Some(first) = counts.next() else {
            continue;
        };
        if first == 0 || !counts.all(|count| count == first) {
            continue;
        }
        if best.map(|(_, count)| first > count).unwrap_or(true) {
            best = Some((delimiter, first));
        }
    }
    best.map(|(delimiter, _)| delimiter)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            // an escaped `""` flips twice and leaves the state unchanged
            quoted = !quoted;
        } else if byte == delimiter && !quoted {
            count += 1;
        }
    }
    count
}

pub fn parse_taxa(text: &str, source: &str) -> Result<Vec<TaxonRow>, KiraError> {
    let delimiter =
        detect_delimiter(text).ok_or_else(|| KiraError::DelimiterDetection(source.to_string()))?;
    let shown = (delimiter as char).escape_default().to_string();
    tracing::debug!(source, delimiter = %shown, "delimiter detected");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| KiraError::InputParse(err.to_string()))?;
    for column in [TAXON_COLUMN, GENOME_COLUMN, GFF_COLUMN] {
        if !headers.iter().any(|header| header == column) {
            return Err(KiraError::MissingColumn(column.to_string()));
        }
    }

    let mut rows = Vec::new();
    for record in reader.deserialize::<RawRow>() {
        let raw = record.map_err(|err| KiraError::InputParse(err.to_string()))?;
        rows.push(TaxonRow {
            taxon: raw.taxon.parse()?,
            genome_link: raw.genome_link,
            gff_link: raw.gff_link,
        });
    }
    Ok(rows)
}

pub fn read_taxa(path: &Utf8Path) -> Result<Vec<TaxonRow>, KiraError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| KiraError::InputRead {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    parse_taxa(&content, path.as_str())
}
