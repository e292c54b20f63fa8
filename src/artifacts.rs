//! Screenshot checkpoints and the files they land in.

use crate::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A point in the run where the page is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// After the heading is visible, before any click.
    Initial,
    /// After the first click has settled.
    Collapsed,
    /// After the second click has settled.
    Expanded,
    /// Whatever the page shows when a step failed.
    Error,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 4] = [
        Checkpoint::Initial,
        Checkpoint::Collapsed,
        Checkpoint::Expanded,
        Checkpoint::Error,
    ];

    /// Fixed file name of this checkpoint's screenshot.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Initial => "verification_initial.png",
            Self::Collapsed => "verification_collapsed.png",
            Self::Expanded => "verification_expanded.png",
            Self::Error => "verification_error.png",
        }
    }

    /// Path of this checkpoint's screenshot inside `dir`.
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial",
            Self::Collapsed => "collapsed",
            Self::Expanded => "expanded",
            Self::Error => "error",
        })
    }
}

/// Output directory holding the checkpoint screenshots of one run.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    dir: PathBuf,
}

impl ArtifactDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, checkpoint: Checkpoint) -> PathBuf {
        checkpoint.path_in(&self.dir)
    }

    /// Create the directory and drop screenshots left over from an earlier
    /// run, so the files present afterwards belong to this run only.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        for checkpoint in Checkpoint::ALL {
            let path = self.path(checkpoint);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Write PNG bytes for a checkpoint, overwriting any previous file.
    pub fn write(&self, checkpoint: Checkpoint, png: &[u8]) -> Result<PathBuf> {
        let path = self.path(checkpoint);
        std::fs::write(&path, png)?;
        debug!("Wrote {} ({} bytes)", path.display(), png.len());
        Ok(path)
    }

    /// Checkpoints whose screenshot currently exists on disk.
    pub fn present(&self) -> Vec<Checkpoint> {
        Checkpoint::ALL
            .into_iter()
            .filter(|c| self.path(*c).is_file())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(Checkpoint::Initial.file_name(), "verification_initial.png");
        assert_eq!(
            Checkpoint::Collapsed.file_name(),
            "verification_collapsed.png"
        );
        assert_eq!(Checkpoint::Expanded.file_name(), "verification_expanded.png");
        assert_eq!(Checkpoint::Error.file_name(), "verification_error.png");
    }

    #[test]
    fn test_prepare_removes_stale_screenshots() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(tmp.path());
        artifacts.write(Checkpoint::Error, b"old").unwrap();
        artifacts.write(Checkpoint::Initial, b"old").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "keep").unwrap();

        artifacts.prepare().unwrap();

        assert!(artifacts.present().is_empty());
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_prepare_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("shots/run");
        let artifacts = ArtifactDir::new(&nested);
        artifacts.prepare().unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_write_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(tmp.path());
        artifacts.write(Checkpoint::Collapsed, b"first").unwrap();
        let path = artifacts.write(Checkpoint::Collapsed, b"second").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
        assert_eq!(artifacts.present(), vec![Checkpoint::Collapsed]);
    }
}
