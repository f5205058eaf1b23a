// JSON files on disk: the identity, the chain and the peer list. Everything
// is written pretty-printed through a temporary file and a rename, so a
// crash mid-write leaves the previous version intact.

use crate::core::{Blockchain, ChainRecord, ConsensusParams};
use crate::error::{BlockchainError, Result};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Read `path` if it exists. A file that exists but does not parse is
/// reported as corrupt.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| BlockchainError::CorruptState(format!("{}: {e}", path.display())))
}

/// Temporary names are unique per write so concurrent saves of the same file
/// never share one; the last rename wins.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{seq}.tmp", process::id()));
    if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Load `path`, or build a fresh value with `init` and write it out
pub fn load_or_init<T, F>(path: &Path, init: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if let Some(value) = load_json(path)? {
        return Ok(value);
    }
    info!("No file at {}, creating one", path.display());
    let value = init()?;
    save_json(path, &value)?;
    Ok(value)
}

pub fn load_chain(path: &Path, params: ConsensusParams) -> Result<Blockchain> {
    let record = load_or_init(path, || Ok(Blockchain::new(params).to_record()))?;
    let chain = Blockchain::from_record(record, params)
        .map_err(|e| BlockchainError::CorruptState(format!("{}: {e}", path.display())))?;
    info!("Loaded {} blocks from {}", chain.len(), path.display());
    Ok(chain)
}

pub fn save_chain(path: &Path, chain: &Blockchain) -> Result<()> {
    save_json::<ChainRecord>(path, &chain.to_record())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Peer, PeerSet};
    use crate::testnet::{create_temp_dir, mine_on, test_identity, test_params};

    #[test]
    fn test_missing_file_is_none() {
        let dir = create_temp_dir().unwrap();
        let loaded: Option<PeerSet> = load_json(&dir.path().join("peers.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_or_init_writes_default() {
        let dir = create_temp_dir().unwrap();
        let path = dir.path().join("peers.json");

        let set = load_or_init(&path, || Ok(PeerSet::with_peers(vec![Peer::new("::1", 1)])))
            .unwrap();
        assert!(path.exists());

        // second call reads the file instead of calling init
        let again: PeerSet = load_or_init(&path, || panic!("init called twice")).unwrap();
        assert_eq!(again.get_peers(), set.get_peers());
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = create_temp_dir().unwrap();
        let path = dir.path().join("blockchain.json");
        fs::write(&path, "{ definitely not a chain").unwrap();

        assert!(matches!(
            load_chain(&path, test_params()),
            Err(BlockchainError::CorruptState(_))
        ));
    }

    #[test]
    fn test_concurrent_saves_of_one_file_all_succeed() {
        let dir = create_temp_dir().unwrap();
        let path = dir.path().join("peers.json");

        std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=8u16)
                .map(|port| {
                    let path = &path;
                    scope.spawn(move || {
                        let set = PeerSet::with_peers(vec![Peer::new("::1", port)]);
                        (0..20).try_for_each(|_| save_json(path, &set))
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }
        });

        let loaded: PeerSet = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        // no temporaries left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_chain_file_round_trip() {
        let dir = create_temp_dir().unwrap();
        let path = dir.path().join("blockchain.json");

        let mut chain = load_chain(&path, test_params()).unwrap();
        assert!(chain.is_empty());

        let miner = test_identity();
        chain.append(mine_on(&chain, miner.address(), vec![])).unwrap();
        save_chain(&path, &chain).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"ver\": \"0.1\""));

        let loaded = load_chain(&path, test_params()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.head_hash(), chain.head_hash());
    }
}
