//! Persists pairing results per device as one JSON file per MAC address, and keeps a short-TTL
//! in-memory cache in front of the filesystem so repeated lookups during a single recon run don't
//! each cost a `stat`+`read`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bluez_async::MacAddress;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PairingData {
    pub address: MacAddress,
    pub paired: bool,
    pub trusted: bool,
    pub bonded_at_unix_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum BondStoreError {
    #[error("creating bond storage directory: {0}")]
    CreateDir(std::io::Error),
    #[error("reading bond record: {0}")]
    Read(std::io::Error),
    #[error("writing bond record: {0}")]
    Write(std::io::Error),
    #[error("serializing bond record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk store of [`PairingData`], one file per device named after its MAC address, with an
/// in-memory cache of recently-read entries that expires after `ttl`.
pub struct BondStore {
    dir: PathBuf,
    ttl: Duration,
    cache: Mutex<HashMap<MacAddress, (PairingData, Instant)>>,
}

impl BondStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, address: &MacAddress) -> PathBuf {
        self.dir.join(format!("{}.json", address.to_string().replace(':', "-")))
    }

    pub async fn load(&self, address: &MacAddress) -> Result<Option<PairingData>, BondStoreError> {
        if let Some((data, at)) = self.cache.lock().unwrap().get(address) {
            if at.elapsed() < self.ttl {
                return Ok(Some(data.clone()));
            }
        }

        let path = self.path_for(address);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(BondStoreError::Read(err)),
        };
        let data: PairingData = serde_json::from_str(&contents)?;
        self.cache
            .lock()
            .unwrap()
            .insert(address.clone(), (data.clone(), Instant::now()));
        Ok(Some(data))
    }

    pub async fn store(&self, data: &PairingData) -> Result<(), BondStoreError> {
        ensure_dir(&self.dir).await?;
        let path = self.path_for(&data.address);
        let contents = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(BondStoreError::Write)?;
        set_mode(&path, 0o600).await;
        self.cache
            .lock()
            .unwrap()
            .insert(data.address.clone(), (data.clone(), Instant::now()));
        Ok(())
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), BondStoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(BondStoreError::CreateDir)?;
    set_mode(dir, 0o700).await;
    Ok(())
}

async fn set_mode(path: &Path, mode: u32) {
    if let Ok(metadata) = tokio::fs::metadata(path).await {
        let mut permissions = metadata.permissions();
        permissions.set_mode(mode);
        let _ = tokio::fs::set_permissions(path, permissions).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("blerecon-bond-store-test-{:?}", std::thread::current().id()));
        dir
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = temp_dir();
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let store = BondStore::new(dir.clone(), Duration::from_secs(300));
        let data = PairingData {
            address: MacAddress::from_str("11:22:33:44:55:66").unwrap(),
            paired: true,
            trusted: true,
            bonded_at_unix_secs: 1_700_000_000,
        };
        store.store(&data).await.unwrap();
        let loaded = store.load(&data.address).await.unwrap();
        assert_eq!(loaded, Some(data));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let dir = temp_dir();
        let _ = tokio::fs::remove_dir_all(&dir).await;
        let store = BondStore::new(dir.clone(), Duration::from_secs(300));
        let address = MacAddress::from_str("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(store.load(&address).await.unwrap(), None);
    }
}
