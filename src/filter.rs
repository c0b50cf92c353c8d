use std::collections::BTreeMap;

use crate::error::KiraError;
use crate::extract::ProteinSet;
use crate::gff::GeneIndex;

pub type LongestProteins = BTreeMap<String, String>;

// Among equally long proteins the last one in set order wins.
pub fn longest_per_gene(
    proteins: &ProteinSet,
    index: &GeneIndex,
) -> Result<LongestProteins, KiraError> {
    let mut longest = LongestProteins::new();
    for (gene, candidates) in index.coding_genes() {
        let mut best_len = 0;
        let mut best: Option<(&String, &String)> = None;
        for protein_id in candidates {
            let sequence = proteins
                .get(protein_id)
                .ok_or_else(|| KiraError::ProteinNotFound {
                    gene: gene.clone(),
                    protein: protein_id.clone(),
                })?;
            let length = sequence.chars().count();
            if length >= best_len {
                best_len = length;
                best = Some((protein_id, sequence));
            }
        }
        if let Some((protein_id, sequence)) = best {
            longest.insert(protein_id.clone(), sequence.clone());
        }
    }
    Ok(longest)
}
