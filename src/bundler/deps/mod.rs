//! Shared library dependency discovery.
//!
//! Walks a tree of built binaries, records an MD5 manifest, collects the
//! sonames each file links against via `ldd`, drops libraries the package
//! bundles itself and maps the rest to distribution packages.
//!
//! An unresolvable library aborts the run; a package must never ship with a
//! partial dependency list.

mod parser;

pub use parser::{LddParser, ProviderParser, ProviderQuery};

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    executor::CommandRunner,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use walkdir::WalkDir;

/// A binary or shared library found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    /// Path on disk
    pub path: PathBuf,
    /// Path relative to the package root, `/` separated
    pub package_path: String,
    /// Lowercase hex MD5 of the contents
    pub md5: String,
    /// Sonames the file links against
    pub sonames: BTreeSet<String>,
}

/// Result of scanning a binary tree.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    artifacts: Vec<BuildArtifact>,
    bundled: BTreeSet<String>,
}

impl ScanReport {
    /// Regular files found, in path order.
    pub fn artifacts(&self) -> &[BuildArtifact] {
        &self.artifacts
    }

    /// File names shipped inside the package (including symlink names).
    pub fn bundled_libraries(&self) -> &BTreeSet<String> {
        &self.bundled
    }

    /// Sonames still needing a provider once bundled libraries are removed.
    ///
    /// Sonames are compared by file name, so `libfoo.so` is excluded whether
    /// `ldd` resolved it to a path or reported it as not found.
    pub fn external_libraries(&self) -> BTreeSet<String> {
        self.artifacts
            .iter()
            .flat_map(|artifact| artifact.sonames.iter())
            .map(|soname| base_name(soname))
            .filter(|name| !self.bundled.contains(name))
            .collect()
    }

    /// `md5sums` style manifest: `<hex>  <path>` per line.
    pub fn manifest(&self) -> String {
        self.artifacts
            .iter()
            .map(|artifact| format!("{}  {}\n", artifact.md5, artifact.package_path))
            .collect()
    }
}

/// Libraries mapped to the packages that provide them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    providers: BTreeMap<String, String>,
}

impl DependencySet {
    /// Providing package per library.
    pub fn providers(&self) -> &BTreeMap<String, String> {
        &self.providers
    }

    /// Sorted, deduplicated package names.
    pub fn packages(&self) -> Vec<String> {
        self.providers
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether no external package is needed.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn base_name(soname: &str) -> String {
    Path::new(soname)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| soname.to_string())
}

fn md5_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).fs_context("opening file for MD5", path)?;
    let mut context = md5::Context::new();
    io::copy(&mut file, &mut context).fs_context("hashing file", path)?;
    Ok(format!("{:x}", context.compute()))
}

/// Scans binaries and resolves their library dependencies.
#[derive(Debug)]
pub struct DependencyResolver<'a, R> {
    runner: &'a R,
    ldd: LddParser,
    provider: ProviderParser,
    cache: Mutex<HashMap<String, String>>,
}

impl<'a, R: CommandRunner> DependencyResolver<'a, R> {
    /// Create a resolver using `query` for package lookups.
    pub fn new(runner: &'a R, query: ProviderQuery) -> Result<Self> {
        Ok(Self {
            runner,
            ldd: LddParser::new()?,
            provider: ProviderParser::new(query)?,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Walk `root`, hashing each regular file and collecting its sonames.
    ///
    /// Manifest paths are relative to `package_root`. Symlinks are not
    /// followed but their names count as bundled libraries. A non-zero `ldd`
    /// exit (static binaries, data files) contributes no sonames.
    pub async fn scan(&self, root: &Path, package_root: &Path) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            report.bundled.insert(name);
            if file_type.is_symlink() {
                continue;
            }

            let path = entry.path().to_path_buf();
            let package_path = path
                .strip_prefix(package_root)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let hash_path = path.clone();
            let md5 = tokio::task::spawn_blocking(move || md5_file(&hash_path))
                .await
                .map_err(|e| Error::Internal(format!("MD5 task failed: {e}")))??;

            let output = self.runner.run(&format!("ldd \"{}\"", path.display())).await?;
            let sonames = if output.success() {
                self.ldd.sonames(&output.text)
            } else {
                log::debug!("ldd reported no dependencies for {}", path.display());
                BTreeSet::new()
            };

            report.artifacts.push(BuildArtifact {
                path,
                package_path,
                md5,
                sonames,
            });
        }

        Ok(report)
    }

    /// Map each external library of `report` to its providing package.
    pub async fn resolve(&self, report: &ScanReport) -> Result<DependencySet> {
        let mut providers = BTreeMap::new();
        for library in report.external_libraries() {
            let package = self.provider_of(&library).await?;
            log::debug!("{} is provided by {}", library, package);
            providers.insert(library, package);
        }
        Ok(DependencySet { providers })
    }

    /// Package providing `library`, cached for the resolver's lifetime.
    pub async fn provider_of(&self, library: &str) -> Result<String> {
        if let Some(hit) = self.cached(library) {
            return Ok(hit);
        }

        let query = self.provider.query();
        let output = self.runner.run(&query.command(library)).await?;
        if !output.success() {
            return Err(Error::Resolution {
                library: library.to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    query.tool(),
                    output.code,
                    output.text.trim()
                ),
            });
        }

        let package = self.provider.provider(&output.text).ok_or_else(|| Error::Resolution {
            library: library.to_string(),
            reason: format!("unrecognised {} output: {}", query.tool(), output.text.trim()),
        })?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(library.to_string(), package.clone());
        }
        Ok(package)
    }

    fn cached(&self, library: &str) -> Option<String> {
        self.cache.lock().ok()?.get(library).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::executor::scripted::ScriptedRunner;

    const APP_LDD: &str = "\tlinux-vdso.so.1 (0x00007ffd2a5f3000)
\tlibfoo.so => /opt/pingnoo/libfoo.so (0x00007f1c1c000000)
\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f1c1b400000)
";
    const FOO_LDD: &str = "\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f1c1b400000)\n";

    fn ldd_of(path: &Path) -> String {
        format!("ldd \"{}\"", path.display())
    }

    #[tokio::test]
    async fn bundled_libraries_are_subtracted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("usr/local/bin/pingnoo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("app"), b"app").unwrap();
        std::fs::write(root.join("libfoo.so"), b"foo").unwrap();

        let runner = ScriptedRunner::new()
            .respond(&ldd_of(&root.join("app")), 0, APP_LDD)
            .respond(&ldd_of(&root.join("libfoo.so")), 0, FOO_LDD);
        let resolver = DependencyResolver::new(&runner, ProviderQuery::Dpkg).unwrap();
        let report = resolver.scan(&root, dir.path()).await.unwrap();

        let external: Vec<_> = report.external_libraries().into_iter().collect();
        assert_eq!(external, vec!["libc.so.6"]);
        for name in report.bundled_libraries() {
            assert!(!report.external_libraries().contains(name));
        }
    }

    #[tokio::test]
    async fn manifest_lists_relative_paths_with_md5() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("usr/local/bin/pingnoo");
        std::fs::create_dir_all(root.join("Components")).unwrap();
        std::fs::write(root.join("Pingnoo"), b"").unwrap();
        std::fs::write(root.join("Components/libRibbon.so"), b"abc").unwrap();

        let runner = ScriptedRunner::new().respond_always("ldd", 1, "not a dynamic executable\n");
        let resolver = DependencyResolver::new(&runner, ProviderQuery::Dpkg).unwrap();
        let report = resolver.scan(&root, dir.path()).await.unwrap();

        assert_eq!(
            report.manifest(),
            "900150983cd24fb0d6963f7d28e17f72  usr/local/bin/pingnoo/Components/libRibbon.so\n\
             d41d8cd98f00b204e9800998ecf8427e  usr/local/bin/pingnoo/Pingnoo\n"
        );
        assert!(report.external_libraries().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_names_count_as_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("libRibbon.so.1"), b"ribbon").unwrap();
        std::os::unix::fs::symlink("libRibbon.so.1", root.join("libRibbon.so")).unwrap();
        std::fs::write(root.join("app"), b"app").unwrap();

        let runner = ScriptedRunner::new()
            .respond(
                &ldd_of(&root.join("app")),
                0,
                "\tlibRibbon.so => not found\n\tlibm.so.6 => /lib/libm.so.6 (0x1)\n",
            )
            .respond_always("ldd", 0, "");
        let resolver = DependencyResolver::new(&runner, ProviderQuery::Dpkg).unwrap();
        let report = resolver.scan(&root, &root).await.unwrap();

        assert_eq!(report.artifacts().len(), 2);
        let external: Vec<_> = report.external_libraries().into_iter().collect();
        assert_eq!(external, vec!["libm.so.6"]);
    }

    #[tokio::test]
    async fn resolves_and_deduplicates_packages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app"), b"app").unwrap();

        let runner = ScriptedRunner::new()
            .respond(
                "ldd",
                0,
                "\tlibc.so.6 => /lib/libc.so.6 (0x1)\n\tlibm.so.6 => /lib/libm.so.6 (0x2)\n",
            )
            .respond("dpkg -S libc.so.6", 0, "libc6:amd64: /lib/x86_64-linux-gnu/libc.so.6\n")
            .respond("dpkg -S libm.so.6", 0, "libc6:amd64: /lib/x86_64-linux-gnu/libm.so.6\n");
        let resolver = DependencyResolver::new(&runner, ProviderQuery::Dpkg).unwrap();
        let report = resolver.scan(dir.path(), dir.path()).await.unwrap();
        let deps = resolver.resolve(&report).await.unwrap();

        assert_eq!(deps.providers().len(), 2);
        assert_eq!(deps.packages(), vec!["libc6"]);
    }

    #[tokio::test]
    async fn unresolved_library_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app"), b"app").unwrap();

        let runner = ScriptedRunner::new()
            .respond("ldd", 0, "\tlibmystery.so.2 => /opt/libmystery.so.2 (0x1)\n")
            .respond(
                "dpkg -S",
                1,
                "dpkg-query: no path found matching pattern *libmystery.so.2*\n",
            );
        let resolver = DependencyResolver::new(&runner, ProviderQuery::Dpkg).unwrap();
        let report = resolver.scan(dir.path(), dir.path()).await.unwrap();
        let err = resolver.resolve(&report).await.unwrap_err();

        match err {
            Error::Resolution { library, .. } => assert_eq!(library, "libmystery.so.2"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_provider_output_is_a_hard_error() {
        let runner = ScriptedRunner::new().respond("pacman -F", 0, "error: no files database\n");
        let resolver = DependencyResolver::new(&runner, ProviderQuery::Pacman).unwrap();
        let err = resolver.provider_of("libc.so.6").await.unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }

    #[tokio::test]
    async fn provider_lookups_are_cached() {
        let runner = ScriptedRunner::new().respond_always(
            "rpm -q",
            0,
            "glibc\n",
        );
        let resolver =
            DependencyResolver::new(&runner, ProviderQuery::Rpm { sixty_four_bit: true }).unwrap();
        assert_eq!(resolver.provider_of("libc.so.6").await.unwrap(), "glibc");
        assert_eq!(resolver.provider_of("libc.so.6").await.unwrap(), "glibc");
        assert_eq!(runner.count("rpm -q"), 1);
    }
}
