use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use camino::Utf8Path;
use regex::Regex;

use crate::domain::MissingProteinIdPolicy;
use crate::error::KiraError;
use crate::fasta::FastaReader;

const PROTEIN_ID: &str = "protein_id";

pub trait ProteinExtractor {
    fn extract(&self, genome: &Utf8Path, gff: &Utf8Path) -> Result<String, KiraError>;
}

/// Runs `gffread <gff> -g <genome> -y - -F` and captures stdout.
#[derive(Debug, Clone)]
pub struct GffreadExtractor {
    program: Option<PathBuf>,
}

impl GffreadExtractor {
    pub fn new() -> Self {
        Self {
            program: find_in_path("gffread"),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            program: Some(program),
        }
    }

    pub fn program(&self) -> Option<&PathBuf> {
        self.program.as_ref()
    }
}

impl Default for GffreadExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProteinExtractor for GffreadExtractor {
    fn extract(&self, genome: &Utf8Path, gff: &Utf8Path) -> Result<String, KiraError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| KiraError::MissingTool("gffread".to_string()))?;
        tracing::debug!(program = %program.display(), %genome, %gff, "running gffread");
        let output = Command::new(program)
            .arg(gff.as_str())
            .args(["-g", genome.as_str(), "-y", "-", "-F"])
            .output()
            .map_err(|err| KiraError::MissingTool(format!("{}: {err}", program.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", program.display(), output.status)
            } else {
                stderr
            };
            return Err(KiraError::ExtractorFailed(message));
        }
        String::from_utf8(output.stdout).map_err(|err| KiraError::ExtractorOutput(err.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProteinSet {
    pub sequences: BTreeMap<String, String>,
    pub records: usize,
    pub skipped: usize,
}

impl ProteinSet {
    pub fn get(&self, protein_id: &str) -> Option<&String> {
        self.sequences.get(protein_id)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

fn attribute_pair() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| Regex::new(r"^.+=.+$").expect("valid attribute regex"))
}

/// Value of `protein_id` in a `key=value;key=value` description, last occurrence wins.
pub fn protein_id_attribute(description: &str) -> Option<&str> {
    let mut found = None;
    for element in description.split(';') {
        if !attribute_pair().is_match(element) {
            continue;
        }
        let mut parts = element.split('=');
        let key = parts.next().unwrap_or_default();
        if key.trim() == PROTEIN_ID {
            found = parts.next().map(str::trim);
        }
    }
    found
}

pub fn parse_protein_records(
    text: &str,
    policy: MissingProteinIdPolicy,
) -> Result<ProteinSet, KiraError> {
    let mut set = ProteinSet::default();
    let mut seen_records = std::collections::HashSet::new();
    let mut previous: Option<String> = None;

    for record in FastaReader::new(text.as_bytes()) {
        let record = record.map_err(|err| KiraError::ExtractorOutput(err.to_string()))?;
        if !seen_records.insert(record.id.clone()) {
            return Err(KiraError::DuplicateRecord(record.id));
        }
        set.records += 1;

        let resolved = record
            .description
            .as_deref()
            .and_then(protein_id_attribute)
            .map(str::to_string);

        let protein_id = match (resolved, policy) {
            (Some(id), _) => id,
            (None, MissingProteinIdPolicy::Skip) => {
                tracing::warn!(record = %record.id, "record without protein_id skipped");
                set.skipped += 1;
                continue;
            }
            (None, MissingProteinIdPolicy::Fail) => {
                return Err(KiraError::MissingProteinId(record.id));
            }
            (None, MissingProteinIdPolicy::ReusePrevious) => match &previous {
                Some(id) => {
                    tracing::warn!(record = %record.id, protein_id = %id, "reusing previous protein_id");
                    id.clone()
                }
                None => return Err(KiraError::MissingProteinId(record.id)),
            },
        };

        set.sequences
            .insert(protein_id.clone(), record.sequence.replace('.', "*"));
        previous = Some(protein_id);
    }

    Ok(set)
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
