use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Directory of throwaway shell scripts standing in for the measurement
/// tools. Removed when dropped.
pub struct FakeBin {
    dir: TempDir,
}

impl FakeBin {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable `/bin/sh` script named `name` and return its path.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake binary");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .expect("chmod fake binary");
        }

        path
    }

    /// Path (inside this dir) where a script can record a pid.
    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}.pid"))
    }
}

impl Default for FakeBin {
    fn default() -> Self {
        Self::new()
    }
}
