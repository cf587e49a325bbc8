#![deny(missing_docs)]
//! Filesystem-backed implementation of quill's StateStore trait.
//!
//! Keys are URL-encoded and stored as `.json` files directly under the
//! root directory. Provides persistence across process restarts.

use async_trait::async_trait;
use quill_types::{StateError, StateStore};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const TMP_SUFFIX: &str = ".tmp";

/// Filesystem-backed state store.
///
/// Directory layout:
/// ```text
/// root/
///   <url-encoded-key>.json
/// ```
///
/// Writes go to a sibling temp file that is renamed into place, so a
/// reader sees either the old value or the new one.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    // Serializes writers that share a temp file name.
    write_lock: Mutex<()>,
}

impl FsStore {
    /// Create a new filesystem store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// The directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key_to_filename(key))
    }
}

/// Encode a key into a safe filename.
fn key_to_filename(key: &str) -> String {
    let mut encoded = String::new();
    for ch in key.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    format!("{encoded}.json")
}

/// Decode a filename back to a key.
fn filename_to_key(filename: &str) -> Option<String> {
    let name = filename.strip_suffix(".json")?;
    let mut result = Vec::new();
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(result).ok()
}

#[async_trait]
impl StateStore for FsStore {
    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>, StateError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
                    tracing::warn!(key, error = %e, "quill.state.corrupt");
                    StateError::Serialization(format!("{}: {e}", path.display()))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::ReadFailed(e.to_string())),
        }
    }

    async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), StateError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;

        let path = self.path_for(key);
        let contents = serde_json::to_string_pretty(&value)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);

        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::WriteFailed(e.to_string())),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StateError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StateError::ReadFailed(e.to_string())),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::ReadFailed(e.to_string()))?
        {
            if let Some(filename) = entry.file_name().to_str() {
                if let Some(key) = filename_to_key(filename) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_encoding_roundtrip() {
        let keys = [
            "chat:conversations",
            "chat:messages:9b2f-11",
            "path/to/key",
            "has spaces",
            "标题🎉",
        ];
        for key in &keys {
            let filename = key_to_filename(key);
            let decoded = filename_to_key(&filename).unwrap();
            assert_eq!(*key, decoded, "roundtrip failed for {key}");
        }
    }

    #[test]
    fn colons_are_encoded() {
        assert_eq!(
            key_to_filename("chat:messages:abc"),
            "chat%3Amessages%3Aabc.json"
        );
    }

    #[test]
    fn filename_to_key_rejects_non_json() {
        assert!(filename_to_key("test.txt").is_none());
        assert!(filename_to_key("chat%3Aconversations.json.tmp").is_none());
    }

    #[tokio::test]
    async fn write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.write("key1", json!("hello")).await.unwrap();
        assert_eq!(store.read("key1").await.unwrap(), Some(json!("hello")));
    }

    #[tokio::test]
    async fn write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.write("k", json!([1, 2])).await.unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = FsStore::new(dir.path());

        let err = store.read("broken").await.unwrap_err();
        assert!(matches!(err, StateError::Serialization(_)));
    }

    #[tokio::test]
    async fn creates_missing_root_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("state");
        let store = FsStore::new(&root);

        store.write("k", json!(1)).await.unwrap();
        assert!(root.join("k.json").exists());
    }

    #[test]
    fn fs_store_implements_state_store() {
        fn _assert_state_store<T: StateStore>() {}
        _assert_state_store::<FsStore>();
    }
}
