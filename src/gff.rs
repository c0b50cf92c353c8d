use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use serde::Serialize;

use crate::error::KiraError;

const GENE: &str = "gene";
const MRNA: &str = "mRNA";
const CDS: &str = "CDS";
const PROTEIN_ID: &str = "protein_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub id: Option<String>,
    pub feature_type: String,
    pub qualifiers: BTreeMap<String, Vec<String>>,
    pub sub_features: Vec<usize>,
    parents: Vec<String>,
}

impl Feature {
    pub fn qualifier(&self, key: &str) -> Option<&[String]> {
        self.qualifiers.get(key).map(Vec::as_slice)
    }

    fn display_name(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("<unnamed {}>", self.feature_type))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GffDocument {
    features: Vec<Feature>,
    top_level: Vec<usize>,
}

impl GffDocument {
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, KiraError> {
        let mut features: Vec<Feature> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|err| KiraError::AnnotationParse {
                line: line_number,
                message: err.to_string(),
            })?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.starts_with("##FASTA") || line.starts_with('>') {
                break;
            }
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < 9 {
                return Err(KiraError::AnnotationParse {
                    line: line_number,
                    message: format!("expected 9 tab-separated columns, found {}", columns.len()),
                });
            }

            let mut qualifiers = parse_attributes(columns[8]);
            let id = qualifiers
                .remove("ID")
                .and_then(|values| values.into_iter().next());
            let parents = qualifiers.remove("Parent").unwrap_or_default();

            let existing = id.as_ref().and_then(|id| by_id.get(id).copied());
            match existing {
                Some(slot) => {
                    let feature = &mut features[slot];
                    for (key, values) in qualifiers {
                        let merged = feature.qualifiers.entry(key).or_default();
                        for value in values {
                            if !merged.contains(&value) {
                                merged.push(value);
                            }
                        }
                    }
                    for parent in parents {
                        if !feature.parents.contains(&parent) {
                            feature.parents.push(parent);
                        }
                    }
                }
                None => {
                    if let Some(id) = &id {
                        by_id.insert(id.clone(), features.len());
                    }
                    features.push(Feature {
                        id,
                        feature_type: columns[2].to_string(),
                        qualifiers,
                        sub_features: Vec::new(),
                        parents,
                    });
                }
            }
        }

        let mut top_level = Vec::new();
        for slot in 0..features.len() {
            let parents = features[slot].parents.clone();
            let mut attached = false;
            for parent in &parents {
                match by_id.get(parent) {
                    Some(&parent_slot) => {
                        features[parent_slot].sub_features.push(slot);
                        attached = true;
                    }
                    None => {
                        tracing::debug!(parent = %parent, feature = %features[slot].display_name(), "unknown parent");
                    }
                }
            }
            if !attached {
                top_level.push(slot);
            }
        }

        Ok(Self {
            features,
            top_level,
        })
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Feature> {
        self.top_level.iter().map(|&slot| &self.features[slot])
    }

    pub fn sub_features<'a>(&'a self, feature: &'a Feature) -> impl Iterator<Item = &'a Feature> {
        feature
            .sub_features
            .iter()
            .map(move |&slot| &self.features[slot])
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn parse_attributes(column: &str) -> BTreeMap<String, Vec<String>> {
    let mut attributes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if column.trim() == "." {
        return attributes;
    }
    for pair in column.split(';') {
        let pair = pair.trim();
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let values = attributes.entry(percent_decode(key)).or_default();
        values.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(percent_decode),
        );
    }
    attributes
}

/// Decodes `%XX` escapes. Malformed escapes are kept literally.
pub fn percent_decode(value: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneIndex {
    pub genes: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GffSummary {
    pub protein_coding_genes: usize,
    pub proteins: usize,
    pub multi_protein_genes: usize,
}

impl GeneIndex {
    pub fn get(&self, gene: &str) -> Option<&BTreeSet<String>> {
        self.genes.get(gene)
    }

    pub fn coding_genes(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.genes.iter().filter(|(_, proteins)| !proteins.is_empty())
    }

    pub fn summary(&self) -> GffSummary {
        let mut summary = GffSummary::default();
        for (_, proteins) in self.coding_genes() {
            summary.protein_coding_genes += 1;
            summary.proteins += proteins.len();
            if proteins.len() >= 2 {
                summary.multi_protein_genes += 1;
            }
        }
        summary
    }
}

pub fn index_genes(document: &GffDocument) -> Result<GeneIndex, KiraError> {
    let mut genes = BTreeMap::new();
    for gene in document.top_level().filter(|f| f.feature_type == GENE) {
        let Some(gene_id) = &gene.id else {
            tracing::debug!("gene feature without ID skipped");
            continue;
        };
        let mut proteins = BTreeSet::new();
        for mrna in document
            .sub_features(gene)
            .filter(|f| f.feature_type == MRNA)
        {
            for cds in document.sub_features(mrna).filter(|f| f.feature_type == CDS) {
                let ids = cds
                    .qualifier(PROTEIN_ID)
                    .ok_or_else(|| KiraError::MissingQualifier {
                        feature: cds.display_name(),
                        qualifier: PROTEIN_ID.to_string(),
                    })?;
                proteins.extend(ids.iter().cloned());
            }
        }
        genes.insert(gene_id.clone(), proteins);
    }
    Ok(GeneIndex { genes })
}

pub fn read_gff(path: &Utf8Path) -> Result<GeneIndex, KiraError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
    let document = GffDocument::parse(BufReader::new(file))?;
    tracing::debug!(%path, features = document.len(), "annotation parsed");
    index_genes(&document)
}
