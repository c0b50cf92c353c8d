use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxonId(String);

impl TaxonId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxonId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized != "."
            && normalized != ".."
            && !normalized
                .chars()
                .any(|ch| ch == '/' || ch == '\\' || ch.is_control());
        if !is_valid {
            return Err(KiraError::InvalidTaxon(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Genome,
    Gff,
}

impl DataKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            DataKind::Genome => "genome.fas",
            DataKind::Gff => "gff",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataKind::Genome => "Genome",
            DataKind::Gff => "GFF",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Genome => write!(f, "genome"),
            DataKind::Gff => write!(f, "gff"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MissingProteinIdPolicy {
    #[default]
    Skip,
    Fail,
    ReusePrevious,
}

impl fmt::Display for MissingProteinIdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingProteinIdPolicy::Skip => write!(f, "skip"),
            MissingProteinIdPolicy::Fail => write!(f, "fail"),
            MissingProteinIdPolicy::ReusePrevious => write!(f, "reuse-previous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_taxon_trims() {
        let taxon: TaxonId = "  Danio_rerio ".parse().unwrap();
        assert_eq!(taxon.as_str(), "Danio_rerio");
    }

    #[test]
    fn parse_taxon_rejects_paths() {
        assert_matches!("../etc".parse::<TaxonId>(), Err(KiraError::InvalidTaxon(_)));
        assert_matches!("".parse::<TaxonId>(), Err(KiraError::InvalidTaxon(_)));
        assert_matches!("..".parse::<TaxonId>(), Err(KiraError::InvalidTaxon(_)));
    }

    #[test]
    fn data_kind_suffixes() {
        assert_eq!(DataKind::Genome.suffix(), "genome.fas");
        assert_eq!(DataKind::Gff.suffix(), "gff");
    }
}
