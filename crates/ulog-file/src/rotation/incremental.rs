//! Incremental (monotonic-index) rotation: files are named
//! `basename-N.ext` for an ever-increasing `N`, with a sidecar
//! `basename.ext.latest` persisting `N` across process restarts.
//!
//! Ported from `rotation_strategy_incremental.h`.

use std::path::PathBuf;

use ulog_status::Status;

use super::{remove_if_present, RotationStrategy};

pub struct IncrementalRotationStrategy {
    basename: PathBuf,
    ext: String,
    max_files: u32,
    final_number: u32,
}

impl IncrementalRotationStrategy {
    /// Reads the sidecar file if present, treating a read failure (missing,
    /// unparsable) as "start from 0" rather than an error.
    #[must_use]
    pub fn new(basename: PathBuf, ext: String, max_files: u32) -> Self {
        let sidecar_path = Self::sidecar_path_for(&basename, &ext);
        let final_number = std::fs::read_to_string(&sidecar_path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);

        Self { basename, ext, max_files: max_files.max(1), final_number }
    }

    fn sidecar_path_for(basename: &std::path::Path, ext: &str) -> PathBuf {
        let mut path = basename.as_os_str().to_owned();
        path.push(ext);
        path.push(".latest");
        PathBuf::from(path)
    }

    fn sidecar_path(&self) -> PathBuf {
        Self::sidecar_path_for(&self.basename, &self.ext)
    }

    fn filename(&self, index: u32) -> PathBuf {
        let mut path = self.basename.as_os_str().to_owned();
        path.push(format!("-{index}"));
        path.push(&self.ext);
        PathBuf::from(path)
    }

    fn write_sidecar(&self) -> Status {
        if let Some(parent) = self.basename.parent() {
            if let Err(e) = crate::path::create_dir_recursive(parent) {
                return Status::io_error(e.to_string());
            }
        }
        match std::fs::write(self.sidecar_path(), self.final_number.to_string()) {
            Ok(()) => Status::ok(),
            Err(e) => Status::io_error(e.to_string()),
        }
    }
}

impl RotationStrategy for IncrementalRotationStrategy {
    fn rotate(&mut self) -> Status {
        self.final_number += 1;

        if self.final_number >= self.max_files {
            let drop_index = self.final_number - self.max_files;
            if let Err(e) = remove_if_present(&self.filename(drop_index)) {
                return Status::io_error(e.to_string());
            }

            // Sweep any leftovers further back (a shrunk `max_files`, or a
            // gap left by an interrupted prior sweep), tolerating up to two
            // consecutive absences before giving up.
            let mut missing_streak = 0;
            let mut i = drop_index;
            while missing_streak < 2 && i > 0 {
                i -= 1;
                let path = self.filename(i);
                if path.exists() {
                    if let Err(e) = remove_if_present(&path) {
                        return Status::io_error(e.to_string());
                    }
                    missing_streak = 0;
                } else {
                    missing_streak += 1;
                }
            }
        }

        self.write_sidecar()
    }

    fn latest_filename(&self) -> PathBuf {
        self.filename(self.final_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn starts_at_zero_with_no_sidecar() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        let strategy = IncrementalRotationStrategy::new(base, ".log".into(), 5);
        assert_eq!(strategy.latest_filename().file_name().unwrap(), "app-0.log");
    }

    #[test]
    fn rotation_increments_and_persists_the_sidecar() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        let mut strategy = IncrementalRotationStrategy::new(base.clone(), ".log".into(), 5);

        strategy.rotate();
        assert_eq!(strategy.latest_filename().file_name().unwrap(), "app-1.log");

        let sidecar = dir.path().join("app.log.latest");
        assert_eq!(std::fs::read_to_string(sidecar).unwrap(), "1");
    }

    #[test]
    fn restart_resumes_from_the_sidecar() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        {
            let mut strategy = IncrementalRotationStrategy::new(base.clone(), ".log".into(), 100);
            for _ in 0..5 {
                strategy.rotate();
            }
            assert_eq!(strategy.latest_filename().file_name().unwrap(), "app-5.log");
        }

        let resumed = IncrementalRotationStrategy::new(base, ".log".into(), 100);
        assert_eq!(resumed.latest_filename().file_name().unwrap(), "app-5.log");
    }

    #[test]
    fn retention_removes_the_file_that_fell_out_of_the_window() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app");
        let mut strategy = IncrementalRotationStrategy::new(base, ".log".into(), 3);

        for i in 0..6 {
            std::fs::write(strategy.latest_filename(), format!("gen{i}")).unwrap();
            strategy.rotate();
        }

        // max_files = 3, 6 rotations total (final_number ends at 6): every
        // generation below final_number - max_files = 3 is swept.
        assert!(!dir.path().join("app-0.log").exists());
        assert!(!dir.path().join("app-1.log").exists());
        assert!(!dir.path().join("app-2.log").exists());
        assert!(!dir.path().join("app-3.log").exists());
        assert!(dir.path().join("app-4.log").exists());
        assert!(dir.path().join("app-5.log").exists());
    }
}
