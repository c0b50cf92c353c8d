use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;

use crate::domain::{DataKind, TaxonId};
use crate::error::KiraError;

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KiraError> {
        let cwd = std::env::current_dir().map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| KiraError::Filesystem("invalid working directory path".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn data_path(&self, taxon: &TaxonId, kind: DataKind) -> Utf8PathBuf {
        self.root.join(format!("{taxon}.{}", kind.suffix()))
    }

    pub fn compressed_path(&self, taxon: &TaxonId, kind: DataKind) -> Utf8PathBuf {
        self.root.join(format!("{taxon}.{}.gz", kind.suffix()))
    }

    pub fn genome_path(&self, taxon: &TaxonId) -> Utf8PathBuf {
        self.data_path(taxon, DataKind::Genome)
    }

    pub fn gff_path(&self, taxon: &TaxonId) -> Utf8PathBuf {
        self.data_path(taxon, DataKind::Gff)
    }

    pub fn output_path(&self, taxon: &TaxonId) -> Utf8PathBuf {
        self.root.join(format!("{taxon}.fas"))
    }

    pub fn exists(path: &Utf8Path) -> bool {
        path.as_std_path().is_file()
    }

    pub fn staging_file(dest: &Utf8Path) -> Result<NamedTempFile, KiraError> {
        let parent = dest
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
        let parent = if parent.as_str().is_empty() {
            Utf8Path::new(".")
        } else {
            parent
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        tempfile::Builder::new()
            .prefix(".kira-proteome")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn persist(mut temp: NamedTempFile, dest: &Utf8Path) -> Result<(), KiraError> {
        temp.as_file_mut()
            .flush()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("persist {dest}: {}", err.error)))?;
        Ok(())
    }

    pub fn write_file_atomic(dest: &Utf8Path, contents: &[u8]) -> Result<(), KiraError> {
        let mut temp = Self::staging_file(dest)?;
        temp.write_all(contents)
            .map_err(|err| KiraError::Filesystem(format!("write {dest}: {err}")))?;
        Self::persist(temp, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new_with_root(Utf8PathBuf::from("/data/run"));
        let taxon: TaxonId = "Hsap".parse().unwrap();
        assert_eq!(store.genome_path(&taxon), "/data/run/Hsap.genome.fas");
        assert_eq!(
            store.compressed_path(&taxon, DataKind::Genome),
            "/data/run/Hsap.genome.fas.gz"
        );
        assert_eq!(store.gff_path(&taxon), "/data/run/Hsap.gff");
        assert_eq!(
            store.compressed_path(&taxon, DataKind::Gff),
            "/data/run/Hsap.gff.gz"
        );
        assert_eq!(store.output_path(&taxon), "/data/run/Hsap.fas");
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let dest = root.join("out.fas");
        Store::write_file_atomic(&dest, b"first").unwrap();
        Store::write_file_atomic(&dest, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(dest.as_std_path()).unwrap(), "second");
    }
}
