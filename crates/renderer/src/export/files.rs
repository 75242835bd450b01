use std::fs;
use std::path::{Path, PathBuf};

/// First `dir/stemN.ext` (N from 0) that does not exist yet.
pub fn unique_file_in(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    first_free(|index| dir.join(format!("{stem}{index}.{extension}")))
}

/// Creates and returns the first free `dir/stemN` directory.
pub fn unique_dir_in(dir: &Path, stem: &str) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    loop {
        let candidate = first_free(|index| dir.join(format!("{stem}{index}")));
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            // Raced with another writer; probe again.
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}

fn first_free(candidate: impl Fn(u32) -> PathBuf) -> PathBuf {
    let mut index = 0u32;
    loop {
        let path = candidate(index);
        if !path.exists() {
            return path;
        }
        index += 1;
    }
}
