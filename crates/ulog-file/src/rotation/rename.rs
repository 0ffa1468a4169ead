//! Rename-chain rotation: the live file always keeps `basename + ext`;
//! history shifts upward as `basename.1.ext`, `basename.2.ext`, ….
//!
//! Ported from `rotation_strategy_rename.h`. Keeping the live filename
//! constant across rotations is deliberate: callers running `tail -f`
//! against the live file survive rotation (`-F` is needed to pick the file
//! back up, `-f` alone is not — a known, accepted tradeoff of this scheme).

use std::path::PathBuf;

use ulog_status::Status;

use super::{remove_if_present, RotationStrategy};

pub struct RenameRotationStrategy {
    basename: PathBuf,
    ext: String,
    max_files: u32,
}

impl RenameRotationStrategy {
    #[must_use]
    pub fn new(basename: PathBuf, ext: String, max_files: u32) -> Self {
        Self { basename, ext, max_files: max_files.max(1) }
    }

    fn filename(&self, index: u32) -> PathBuf {
        if index == 0 {
            let mut path = self.basename.clone().into_os_string();
            path.push(&self.ext);
            PathBuf::from(path)
        } else {
            let mut path = self.basename.clone().into_os_string();
            path.push(format!(".{index}"));
            path.push(&self.ext);
            PathBuf::from(path)
        }
    }
}

impl RotationStrategy for RenameRotationStrategy {
    fn rotate(&mut self) -> Status {
        for i in (1..self.max_files).rev() {
            let from = self.filename(i - 1);
            if from.exists() {
                let to = self.filename(i);
                if let Err(e) = std::fs::rename(&from, &to) {
                    return Status::io_error(e.to_string()).with_context(format!(
                        "renaming {} to {}",
                        from.display(),
                        to.display()
                    ));
                }
            }
        }

        // Sweep any surplus left behind by a shrunk `max_files` or a prior
        // run with a larger retention window: remove indices at and beyond
        // `max_files`, tolerating gaps (stop at two consecutive absences).
        let mut missing_streak = 0;
        let mut i = self.max_files;
        while missing_streak < 2 {
            let path = self.filename(i);
            let existed = path.exists();
            if let Err(e) = remove_if_present(&path) {
                return Status::io_error(e.to_string());
            }
            missing_streak = if existed { 0 } else { missing_streak + 1 };
            i += 1;
        }

        Status::ok()
    }

    fn latest_filename(&self) -> PathBuf {
        self.filename(0)
    }
}
