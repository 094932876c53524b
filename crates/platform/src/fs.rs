//! Build context and image filesystem helpers

use envbake_errors::{FilesystemError, ProvisioningError as Error};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Packaging manifests that make a directory installable in editable mode
pub const PACKAGING_MANIFESTS: &[&str] = &["setup.py", "pyproject.toml"];

/// Resolve a context-relative copy source, rejecting paths that escape the
/// context directory
///
/// # Errors
///
/// Returns `FilesystemError::MissingContextPath` if the source is absolute,
/// climbs out of the context, or does not exist.
pub async fn resolve_context_path(step: &str, context_dir: &Path, input: &str) -> Result<PathBuf> {
    let missing = || FilesystemError::MissingContextPath {
        step: step.to_string(),
        path: input.to_string(),
    };

    let relative = Path::new(input);
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(missing().into());
    }

    let path = context_dir.join(relative);
    if fs::try_exists(&path).await.unwrap_or(false) {
        Ok(path)
    } else {
        Err(missing().into())
    }
}

/// Every regular file under `path`, relative to `path`'s parent
///
/// A plain file yields just its own name. Results are sorted.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub async fn list_files(path: &Path) -> Result<Vec<PathBuf>> {
    let base = path.parent().unwrap_or(path);
    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];

    while let Some(current) = pending.pop() {
        let metadata = fs::metadata(&current)
            .await
            .map_err(|e| Error::io_with_path(&e, &current))?;
        if metadata.is_dir() {
            let mut entries = fs::read_dir(&current)
                .await
                .map_err(|e| Error::io_with_path(&e, &current))?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push(entry.path());
            }
        } else if let Ok(relative) = current.strip_prefix(base) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Recursively copy a file or directory
///
/// # Errors
///
/// Returns an error if:
/// - Creating the destination directory fails
/// - Reading the source directory fails
/// - Copying any file or subdirectory fails
pub async fn copy_path(src: &Path, dst: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(src).await?;
    if !metadata.is_dir() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(src, dst).await?;
        return Ok(());
    }

    fs::create_dir_all(dst).await?;

    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        Box::pin(copy_path(&src_path, &dst_path)).await?;
    }

    Ok(())
}

/// Remove everything inside a directory, keeping the directory itself
///
/// A missing directory counts as already empty.
///
/// # Errors
///
/// Returns an error if an entry cannot be removed.
pub async fn clear_dir(path: &Path) -> std::io::Result<()> {
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&entry_path).await?;
        } else {
            fs::remove_file(&entry_path).await?;
        }
    }

    Ok(())
}

/// Image path a copy source lands at: its last component under `destination`
///
/// `src/pkg` copied to `/workspace` becomes `/workspace/pkg`, matching the
/// layout [`list_files`] reports.
#[must_use]
pub fn copy_target(destination: &Path, source: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => destination.join(name),
        None => destination.to_path_buf(),
    }
}

/// Map an absolute image path below a host root directory
#[must_use]
pub fn under_root(root: &Path, image_path: &Path) -> PathBuf {
    let relative: PathBuf = image_path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_resolve_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let err = resolve_context_path("copy", dir.path(), "../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Filesystem(FilesystemError::MissingContextPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_files_relative_to_parent() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("safepo");
        fs::create_dir_all(pkg.join("algos")).await.unwrap();
        fs::write(pkg.join("__init__.py"), "").await.unwrap();
        fs::write(pkg.join("algos").join("ppo.py"), "").await.unwrap();
        fs::write(dir.path().join("setup.py"), "").await.unwrap();

        let files = list_files(&pkg).await.unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("safepo/__init__.py"),
                PathBuf::from("safepo/algos/ppo.py"),
            ]
        );
        assert_eq!(
            list_files(&dir.path().join("setup.py")).await.unwrap(),
            vec![PathBuf::from("setup.py")]
        );
    }

    #[tokio::test]
    async fn test_copy_and_clear() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("pkg")).await.unwrap();
        fs::write(src.path().join("pkg").join("a.py"), "x = 1").await.unwrap();

        copy_path(&src.path().join("pkg"), &dst.path().join("pkg"))
            .await
            .unwrap();
        assert!(dst.path().join("pkg").join("a.py").exists());

        clear_dir(dst.path()).await.unwrap();
        assert!(dst.path().exists());
        assert!(!dst.path().join("pkg").exists());
        clear_dir(&dst.path().join("missing")).await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_target_matches_listed_files() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("src").join("pkg");
        fs::create_dir_all(&nested).await.unwrap();
        fs::write(nested.join("mod.py"), "").await.unwrap();

        let target = copy_target(Path::new("/workspace"), Path::new("src/pkg"));
        assert_eq!(target, PathBuf::from("/workspace/pkg"));

        let listed = list_files(&nested).await.unwrap();
        assert_eq!(
            Path::new("/workspace").join(&listed[0]),
            target.join("mod.py")
        );
    }

    #[test]
    fn test_under_root() {
        assert_eq!(
            under_root(Path::new("/tmp/image"), Path::new("/workspace/setup.py")),
            PathBuf::from("/tmp/image/workspace/setup.py")
        );
    }
}
