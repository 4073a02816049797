//! Filesystem probing used by the staleness policies.

use std::path::Path;
use std::time::SystemTime;

/// MTime info gathered for a path.  This also models "file is absent".
/// It's not using an Option<> just because it makes the code using it easier
/// to follow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MTime {
    Missing,
    Stamp(SystemTime),
}

/// stat() an on-disk path, producing its MTime.  A directory output counts
/// as present just like a file does.
pub fn stat(path: &Path) -> std::io::Result<MTime> {
    Ok(match std::fs::metadata(path) {
        Ok(meta) => MTime::Stamp(meta.modified()?),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                MTime::Missing
            } else {
                return Err(err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(stat(&dir.path().join("nope")).unwrap(), MTime::Missing);
    }

    #[test]
    fn stat_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(stat(&path).unwrap(), MTime::Stamp(_)));
    }
}
