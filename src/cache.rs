use std::fs;

use crate::domain::CacheTarget;

/// Decides whether an acquisition step is already satisfied on disk.
pub struct CacheGate;

impl CacheGate {
    pub fn is_satisfied(target: &CacheTarget, overwrite: bool) -> bool {
        if overwrite {
            return false;
        }
        match target {
            CacheTarget::File(path) => path.as_std_path().is_file(),
            CacheTarget::Family {
                dir,
                prefix,
                suffix,
            } => {
                let Ok(entries) = fs::read_dir(dir.as_std_path()) else {
                    return false;
                };
                entries.flatten().any(|entry| {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    name.starts_with(prefix.as_str())
                        && name.ends_with(suffix.as_str())
                        && entry.path().is_file()
                })
            }
        }
    }
}
