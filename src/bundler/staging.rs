//! Staging trees and pending artifacts.
//!
//! A [`StagingTree`] is a disposable directory mirroring a package layout. It
//! is removed and recreated at the start of every run, so it never carries
//! files from a previous run.
//!
//! A [`PendingArtifact`] is the packaging tool's output file while the run is
//! still in progress. It lives in the deployment directory under a temporary
//! name and is deleted on drop unless [`PendingArtifact::persist`] moves it
//! into place, so a failed run never replaces a previous good artifact.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    platform::PackageType,
    utils::{fs as ufs, http},
    BundledArtifact,
};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A freshly created directory tree that packaging stages files into.
#[derive(Debug, Clone)]
pub struct StagingTree {
    root: PathBuf,
}

impl StagingTree {
    /// Remove any existing tree at `root` and create an empty one.
    pub async fn recreate(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ufs::remove_dir_all(&root).await?;
        tokio::fs::create_dir_all(&root)
            .await
            .fs_context("creating staging directory", &root)?;
        log::debug!("staging tree at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of the tree.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of `rel` inside the tree.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Create each relative directory.
    pub async fn create_dirs(&self, dirs: &[&str]) -> Result<()> {
        for dir in dirs {
            let path = self.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .fs_context("creating staging directory", &path)?;
        }
        Ok(())
    }

    /// Copy `src` to the relative file path `rel_dest`.
    pub async fn copy_file(&self, src: &Path, rel_dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = self.join(rel_dest);
        ufs::copy_file(src, &dest).await?;
        Ok(dest)
    }

    /// Copy `src` into the relative directory `rel_dir`, keeping its file name.
    pub async fn copy_into(&self, src: &Path, rel_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let name = src
            .file_name()
            .ok_or_else(|| Error::GenericError(format!("{} has no file name", src.display())))?;
        self.copy_file(src, rel_dir.as_ref().join(name)).await
    }

    /// Recursively copy directory `src` to `rel_dest`, preserving symlinks.
    pub async fn copy_tree(&self, src: &Path, rel_dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = self.join(rel_dest);
        ufs::copy_dir(src, &dest).await?;
        Ok(dest)
    }

    /// Copy every file matching `pattern` into `rel_dir`; returns how many were copied.
    pub async fn copy_glob(&self, pattern: &Path, rel_dir: impl AsRef<Path>) -> Result<usize> {
        let pattern = pattern.to_string_lossy();
        let mut copied = 0;
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if path.is_file() {
                self.copy_into(&path, rel_dir.as_ref()).await?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Write `contents` to the relative path `rel`.
    pub async fn write(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let dest = self.join(rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating staging directory", parent)?;
        }
        tokio::fs::write(&dest, contents)
            .await
            .fs_context("writing staged file", &dest)?;
        Ok(dest)
    }
}

/// Output file that only appears under its final name on success.
#[derive(Debug)]
pub struct PendingArtifact {
    file: NamedTempFile,
    target: PathBuf,
}

impl PendingArtifact {
    /// Reserve a temporary file in `dir` that will become `dir/file_name`.
    ///
    /// The temporary name keeps the final extension because several tools
    /// (appimagetool, Advanced Installer) infer the format from it.
    pub fn new(dir: &Path, file_name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).fs_context("creating deployment directory", dir)?;
        let suffix = Path::new(file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .fs_context("creating temporary artifact", dir)?;

        // tempfile creates 0600; tools that write into the existing file keep that mode
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))
                .fs_context("setting artifact permissions", file.path())?;
        }

        Ok(Self {
            file,
            target: dir.join(file_name),
        })
    }

    /// Temporary path the packaging tool should write to.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Final path once persisted.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Fill the temporary file with a copy of `src`.
    pub async fn fill_from(&self, src: &Path) -> Result<()> {
        tokio::fs::copy(src, self.path())
            .await
            .fs_context("copying artifact", src)?;
        Ok(())
    }

    /// Move the file to its final name and describe it.
    pub async fn persist(self, package_type: PackageType) -> Result<BundledArtifact> {
        let target = self.target;
        self.file.persist(&target).map_err(|e| Error::Fs {
            context: "moving artifact into place",
            path: target.clone(),
            error: e.error,
        })?;

        let size = tokio::fs::metadata(&target)
            .await
            .fs_context("reading artifact metadata", &target)?
            .len();
        let checksum = http::sha256_file(&target).await?;

        Ok(BundledArtifact {
            package_type,
            paths: vec![target],
            size,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(root: &Path) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| {
                e.unwrap()
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn recreate_removes_stale_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bin/x86_64/Deploy/dpkg");
        std::fs::create_dir_all(root.join("usr/old")).unwrap();
        std::fs::write(root.join("usr/old/stale.so"), b"old").unwrap();
        std::fs::write(root.join("leftover"), b"old").unwrap();

        let src = dir.path().join("Pingnoo");
        std::fs::write(&src, b"binary").unwrap();

        let tree = StagingTree::recreate(&root).await.unwrap();
        tree.copy_into(&src, "usr/local/bin/pingnoo").await.unwrap();

        assert_eq!(
            listing(&root),
            vec!["usr", "usr/local", "usr/local/bin", "usr/local/bin/pingnoo", "usr/local/bin/pingnoo/Pingnoo"]
        );
    }

    #[tokio::test]
    async fn copy_glob_copies_only_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("Release");
        std::fs::create_dir_all(build.join("Components")).unwrap();
        std::fs::write(build.join("libRibbon.so"), b"a").unwrap();
        std::fs::write(build.join("libMapWidget.so"), b"b").unwrap();
        std::fs::write(build.join("Pingnoo"), b"c").unwrap();

        let tree = StagingTree::recreate(dir.path().join("stage")).await.unwrap();
        let copied = tree.copy_glob(&build.join("*.so"), "usr/lib").await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            listing(tree.path()),
            vec!["usr", "usr/lib", "usr/lib/libMapWidget.so", "usr/lib/libRibbon.so"]
        );
    }

    #[tokio::test]
    async fn dropped_pending_artifact_leaves_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("pingnoo.deb");
        std::fs::write(&previous, b"good").unwrap();

        {
            let pending = PendingArtifact::new(dir.path(), "pingnoo.deb").unwrap();
            std::fs::write(pending.path(), b"half written").unwrap();
            assert!(pending.path().to_string_lossy().ends_with(".deb"));
        }

        assert_eq!(std::fs::read(&previous).unwrap(), b"good");
        assert_eq!(listing(dir.path()), vec!["pingnoo.deb"]);
    }

    #[tokio::test]
    async fn persisted_artifact_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pingnoo.deb"), b"old").unwrap();

        let pending = PendingArtifact::new(dir.path(), "pingnoo.deb").unwrap();
        std::fs::write(pending.path(), b"new").unwrap();
        let artifact = pending.persist(PackageType::Deb).await.unwrap();

        assert_eq!(artifact.paths, vec![dir.path().join("pingnoo.deb")]);
        assert_eq!(artifact.size, 3);
        assert_eq!(artifact.checksum.len(), 64);
        assert_eq!(std::fs::read(dir.path().join("pingnoo.deb")).unwrap(), b"new");
        assert_eq!(listing(dir.path()), vec!["pingnoo.deb"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn persisted_artifact_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pending = PendingArtifact::new(dir.path(), "pingnoo_2021.03.15-R3_amd64.deb").unwrap();

        // dpkg-deb opens the existing file with O_TRUNC, keeping its mode
        std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(pending.path())
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"debdata"))
            .unwrap();
        let artifact = pending.persist(PackageType::Deb).await.unwrap();

        let mode = std::fs::metadata(&artifact.paths[0]).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
