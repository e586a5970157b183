use std::collections::HashSet;
use std::path::{Path, PathBuf};

const DIRECTORY_NAMED_FILES: [&str; 2] = ["fid", "ser"];

/// Base name of a raw dataset. Vendor layouts that store the data in a file
/// called `fid` or `ser` are named after their directory.
pub fn dataset_base_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let directory_named = DIRECTORY_NAMED_FILES
        .iter()
        .any(|name| stem.eq_ignore_ascii_case(name));
    if directory_named
        && let Some(parent) = source.parent().and_then(Path::file_name)
    {
        return parent.to_string_lossy().into_owned();
    }

    if stem.is_empty() {
        "dataset".to_string()
    } else {
        stem
    }
}

/// Default location of the processing script saved next to `source`.
pub fn default_script_path(source: &Path, suffix: &str, extension: &str) -> PathBuf {
    let directory = source.parent().unwrap_or_else(|| Path::new(""));
    directory.join(format!(
        "{}{}.{}",
        dataset_base_name(source),
        suffix,
        extension
    ))
}

pub fn derive_output_path(source: &Path, output_dir: &Path, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", dataset_base_name(source), extension))
}

/// Output paths for several sources sharing one directory. A base name that
/// is already taken (ignoring case) gets a `_2`, `_3`, ... suffix.
pub fn derive_output_paths(sources: &[PathBuf], output_dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    sources
        .iter()
        .map(|source| {
            let base = dataset_base_name(source);
            let mut name = base.clone();
            let mut copy = 1;
            while !taken.insert(name.to_lowercase()) {
                copy += 1;
                name = format!("{}_{}", base, copy);
            }
            output_dir.join(format!("{}.{}", name, extension))
        })
        .collect()
}
