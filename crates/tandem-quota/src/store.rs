//! On-disk timestamp log, one file per account identity.
//!
//! Layout: `<dir>/<identity>.json` holding a JSON array of epoch-ms
//! timestamps in insertion order. Every save writes the full array to a
//! sibling `.tmp` file and renames it into place, so a crash mid-write
//! leaves either the old log or the new one, never a torn file.

use crate::error::QuotaResult;
use std::path::{Path, PathBuf};
use tandem_core::AccountIdentity;

/// File-backed store for one or more ledgers sharing a directory.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    dir: PathBuf,
}

impl LedgerStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> QuotaResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Load the persisted timestamp log for `identity`.
    ///
    /// A missing file is an empty log, not an error.
    pub fn load(&self, identity: &AccountIdentity) -> QuotaResult<Vec<u64>> {
        let path = self.path_for(identity);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Atomically replace the persisted log for `identity`.
    pub fn save(&self, identity: &AccountIdentity, stamps: &[u64]) -> QuotaResult<()> {
        let path = self.path_for(identity);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(stamps)?;
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn path_for(&self, identity: &AccountIdentity) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(identity.as_str())))
    }
}

/// Map an identity to a filesystem-safe file stem.
fn sanitize(identity: &str) -> String {
    identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let log = store.load(&AccountIdentity::new("0xabc")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let id = AccountIdentity::new("0xabc");

        store.save(&id, &[1, 2, 3]).unwrap();
        assert_eq!(store.load(&id).unwrap(), vec![1, 2, 3]);

        // Overwrite keeps only the latest set
        store.save(&id, &[4, 5]).unwrap();
        assert_eq!(store.load(&id).unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        store.save(&AccountIdentity::new("0xabc"), &[1]).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0xabc.json".to_string()]);
    }

    #[test]
    fn test_identities_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        let a = AccountIdentity::new("0xaaa");
        let b = AccountIdentity::new("0xbbb");

        store.save(&a, &[1]).unwrap();
        store.save(&b, &[2]).unwrap();

        assert_eq!(store.load(&a).unwrap(), vec![1]);
        assert_eq!(store.load(&b).unwrap(), vec![2]);
    }

    #[test]
    fn test_sanitize_odd_identities() {
        assert_eq!(sanitize("a/b:c"), "a_b_c");
        assert_eq!(sanitize("0xDead-Beef_01.x"), "0xDead-Beef_01.x");
    }
}
