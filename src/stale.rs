//! Staleness policies: decide, per rule, whether its recipe must run.
//!
//! A policy wraps the recipe invocation and is installed as a node's action,
//! so the up-to-date check happens at the moment the node would execute, with
//! all dependency outputs already on disk.

use crate::fs::{self, MTime};
use crate::hash::{self, HashFn};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// A caller-supplied build step: reads `inputs`, produces `output`.  Any
/// failure aborts the build; partial output cleanup is the recipe's own
/// responsibility.
pub type Recipe = Box<dyn Fn(&[PathBuf], &Path) -> anyhow::Result<()> + Send + Sync>;

/// The up-to-date check.  Implementations either invoke the recipe or decide
/// the output can be kept as is.
pub trait Staleness: Send + Sync {
    fn maybe_run(&self, recipe: &Recipe, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()>;
}

/// Timestamp comparison, the default policy.  Runs the recipe when the output
/// is missing or older than any input; writes no metadata.  Resolution is
/// bounded by filesystem timestamp granularity, and clock skew across
/// filesystems can fool it; that is an accepted limitation.
pub struct Mtime;

impl Staleness for Mtime {
    fn maybe_run(&self, recipe: &Recipe, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        let out_time = match fs::stat(output)
            .with_context(|| format!("stat {}", output.display()))?
        {
            MTime::Missing => return recipe(inputs, output),
            MTime::Stamp(t) => t,
        };
        for input in inputs {
            match fs::stat(input).with_context(|| format!("stat {}", input.display()))? {
                // An absent input is the recipe's error to report, not ours.
                MTime::Missing => return recipe(inputs, output),
                MTime::Stamp(t) if out_time < t => return recipe(inputs, output),
                MTime::Stamp(_) => {}
            }
        }
        Ok(())
    }
}

/// Content-hash comparison against a digest persisted in a sidecar file,
/// for cases where timestamps are unreliable or a generator's own version
/// must be able to force regeneration (bump the salt).
pub struct InputHash {
    pub hash: HashFn,
    /// Mixed into every digest; changing it invalidates all cached digests.
    pub salt: Vec<u8>,
    /// Appended to the output path to form the sidecar path.
    pub suffix: String,
}

impl Default for InputHash {
    fn default() -> Self {
        InputHash {
            hash: hash::sha256,
            salt: Vec::new(),
            suffix: ".input_hash".to_string(),
        }
    }
}

impl InputHash {
    pub fn with_salt(salt: impl Into<Vec<u8>>) -> Self {
        InputHash {
            salt: salt.into(),
            ..InputHash::default()
        }
    }

    fn sidecar(&self, output: &Path) -> PathBuf {
        let mut path = output.as_os_str().to_os_string();
        path.push(&self.suffix);
        PathBuf::from(path)
    }
}

impl Staleness for InputHash {
    fn maybe_run(&self, recipe: &Recipe, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        let digest = hash::digest_files(self.hash, inputs, &self.salt)?;
        let sidecar = self.sidecar(output);

        let present = fs::stat(output)
            .with_context(|| format!("stat {}", output.display()))?
            != MTime::Missing;
        if present {
            // Sidecar is a raw byte dump of the digest; byte equality is the
            // only comparison.  Unreadable or absent means rebuild.
            if let Ok(stored) = std::fs::read(&sidecar) {
                if stored == digest {
                    return Ok(());
                }
            }
        }

        recipe(inputs, output)?;
        std::fs::write(&sidecar, &digest)
            .with_context(|| format!("write {}", sidecar.display()))?;
        Ok(())
    }
}
