/// This module loads compiled contract artifacts. Both the hardhat layout
/// (`artifacts/contracts/<File>.sol/<Name>.json`, `bytecode` as a hex string)
/// and the foundry layout (`out/<File>.sol/<Name>.json`, `bytecode.object`)
/// are understood.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use ethers::{abi::Abi, types::Bytes};
use eyre::Result;
use serde::Deserialize;
use tracing::debug;

/// Directories that hold compiler metadata rather than artifacts.
const SKIPPED_DIRS: &[&str] = &["build-info", "cache"];

#[derive(Clone, Debug)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: Abi,
    /// Creation bytecode. Interfaces and abstract contracts have none.
    pub bytecode: Option<Bytes>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    contract_name: Option<String>,
    abi: Abi,
    #[serde(default)]
    bytecode: Option<RawBytecode>,
}

impl RawArtifact {
    fn into_artifact(self, fallback_name: String) -> Artifact {
        let bytecode = self.bytecode.and_then(|raw| {
            let hex = match raw {
                RawBytecode::Hex(hex) => hex,
                RawBytecode::Object { object } => object,
            };
            // Unlinked library placeholders don't parse, and an empty "0x"
            // means there is nothing to deploy.
            hex.parse::<Bytes>().ok().filter(|bytes| !bytes.is_empty())
        });
        Artifact {
            contract_name: self.contract_name.unwrap_or(fallback_name),
            abi: self.abi,
            bytecode,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ArtifactStore {
    artifacts: BTreeMap<String, Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively loads every artifact under `dir`. When two files declare
    /// the same contract name, the first path in sorted order wins.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let mut paths = Vec::new();
        collect_artifact_paths(dir.as_ref(), &mut paths)?;
        paths.sort();

        let mut store = Self::new();
        for path in paths {
            let bytes = std::fs::read(&path)?;
            let raw = match serde_json::from_slice::<RawArtifact>(&bytes) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping non-artifact json");
                    continue;
                }
            };
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            let artifact = raw.into_artifact(stem);
            if !store.artifacts.contains_key(&artifact.contract_name) {
                store.insert(artifact);
            }
        }
        debug!(count = store.artifacts.len(), "loaded artifacts");

        Ok(store)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }
}

fn collect_artifact_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if path.is_dir() {
            if !SKIPPED_DIRS.contains(&name) {
                collect_artifact_paths(&path, paths)?;
            }
        } else if name.ends_with(".json") && !name.ends_with(".dbg.json") {
            paths.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[
        {
            "type": "constructor",
            "inputs": [{ "name": "name_", "type": "string" }],
            "stateMutability": "nonpayable"
        }
    ]"#;

    fn write(path: &Path, contents: &str) -> Result<()> {
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    #[test]
    fn test_load_hardhat_and_foundry_layouts() -> Result<()> {
        let root = std::env::temp_dir().join(format!("fekira-artifacts-{}", std::process::id()));
        write(
            &root.join("contracts/FekiraUniverse.sol/FekiraUniverse.json"),
            &format!(
                r#"{{ "contractName": "FekiraUniverse", "abi": {}, "bytecode": "0x6080" }}"#,
                ABI
            ),
        )?;
        write(
            &root.join("contracts/FekiraUniverse.sol/FekiraUniverse.dbg.json"),
            r#"{ "buildInfo": "../../build-info/abc.json" }"#,
        )?;
        write(
            &root.join("build-info/abc.json"),
            r#"{ "solcLongVersion": "0.8.9" }"#,
        )?;
        write(
            &root.join("out/Proxy.sol/Proxy.json"),
            &format!(r#"{{ "abi": {}, "bytecode": {{ "object": "0x6001" }} }}"#, ABI),
        )?;
        write(
            &root.join("contracts/IERC721.sol/IERC721.json"),
            r#"{ "contractName": "IERC721", "abi": [], "bytecode": "0x" }"#,
        )?;
        write(&root.join("misc/notes.json"), r#"{ "hello": "world" }"#)?;

        let store = ArtifactStore::load(&root)?;
        std::fs::remove_dir_all(&root)?;

        assert_eq!(
            store.names().collect::<Vec<_>>(),
            vec!["FekiraUniverse", "IERC721", "Proxy"]
        );
        let fekira = store.get("FekiraUniverse").unwrap();
        assert_eq!(fekira.bytecode, Some("0x6080".parse()?));
        assert!(fekira.abi.constructor().is_some());
        assert_eq!(
            store.get("Proxy").unwrap().bytecode,
            Some("0x6001".parse()?)
        );
        assert_eq!(store.get("IERC721").unwrap().bytecode, None);
        Ok(())
    }

    #[test]
    fn test_unlinked_bytecode_is_not_deployable() -> Result<()> {
        let raw: RawArtifact = serde_json::from_str(&format!(
            r#"{{ "abi": {}, "bytecode": "0x6080__$aabbccdd$__" }}"#,
            ABI
        ))?;
        let artifact = raw.into_artifact("Linked".to_string());
        assert_eq!(artifact.contract_name, "Linked");
        assert_eq!(artifact.bytecode, None);
        Ok(())
    }

    #[test]
    fn test_missing_dir() {
        assert!(ArtifactStore::load("/nonexistent/fekira/artifacts").is_err());
    }
}
