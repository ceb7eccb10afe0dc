use std::{fs, io::Write, path::Path};

/// Replace `path` with `bytes` so a reader never sees a partial file.
///
/// Writes a sibling `.new` file, syncs it, then renames over the target.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictor").join("exchange.txt");
        write_atomic(&path, b"130,125").unwrap();
        write_atomic(&path, b"131").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "131");
        assert!(!path.with_extension("new").exists());
    }
}
