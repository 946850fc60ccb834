//! Universal (x86_64 + arm64) application bundles.
//!
//! The two single-architecture `.app` builds are merged by `makeuniversal`,
//! which is cloned into `tools/` and built with the selected Qt on first use.

use crate::bundler::{
    Arch, Bundler,
    error::Result,
    executor::{CommandRunner, in_dir},
    tools,
};
use std::path::{Path, PathBuf};

const REPOSITORY: &str = "https://github.com/fizzyade/makeuniversal.git";

/// Locate `tools/makeuniversal/makeuniversal`, cloning and building it if needed.
pub async fn ensure_makeuniversal<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    qtdir: &Path,
) -> Result<PathBuf> {
    let tools_dir = bundler.settings().tools_dir();
    if let Some(existing) = tools::cloned_tool(&tools_dir, "makeuniversal", "makeuniversal") {
        return Ok(existing);
    }

    bundler
        .step(
            "Cloning makeuniversal",
            tools::clone_tool(bundler.runner(), &tools_dir, "makeuniversal", REPOSITORY, "main.cpp"),
        )
        .await?;

    let checkout = tools_dir.join("makeuniversal");
    bundler
        .step(
            "Building makeuniversal",
            bundler.runner().checked(
                &in_dir(
                    &checkout,
                    &format!("\"{}\" && make", qtdir.join("bin").join("qmake").display()),
                ),
                "error building makeuniversal.",
            ),
        )
        .await?;

    Ok(checkout.join("makeuniversal"))
}

/// Merge the x86_64 and arm64 builds of `app_name` into `output`.
pub async fn merge_app<R: CommandRunner>(
    bundler: &Bundler<'_, R>,
    makeuniversal: &Path,
    app_name: &str,
    output: &Path,
) -> Result<()> {
    let settings = bundler.settings();
    let inputs: Vec<PathBuf> = [Arch::X86_64, Arch::Arm64]
        .into_iter()
        .map(|arch| settings.build_dir_for(arch).join(app_name))
        .collect();

    bundler
        .step(
            "Running makeuniversal",
            bundler.runner().checked(
                &format!(
                    "\"{}\" \"{}\" \"{}\" \"{}\"",
                    makeuniversal.display(),
                    output.display(),
                    inputs[0].display(),
                    inputs[1].display()
                ),
                "error building makeuniversal.",
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{SettingsBuilder, executor::scripted::ScriptedRunner};
    use crate::cli::OutputManager;
    use crate::version::ProductVersion;

    #[tokio::test]
    async fn clones_and_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::new()
            .root(dir.path())
            .arch(Arch::Universal)
            .version(ProductVersion::parse("2021.03.15-R3").unwrap())
            .build()
            .unwrap();
        let checkout = dir.path().join("tools/makeuniversal");
        let runner = ScriptedRunner::new()
            .respond("git clone", 0, "")
            .creates("git clone", checkout.join("main.cpp"))
            .respond("&& make", 0, "")
            .creates("&& make", checkout.join("makeuniversal"));
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);
        let qtdir = Path::new("/opt/Qt/5.15.2/clang_64");

        let tool = ensure_makeuniversal(&bundler, qtdir).await.unwrap();
        assert_eq!(tool, checkout.join("makeuniversal"));
        let again = ensure_makeuniversal(&bundler, qtdir).await.unwrap();
        assert_eq!(again, tool);
        assert_eq!(runner.count("git clone"), 1);
        assert!(runner.commands()[1].contains("/opt/Qt/5.15.2/clang_64/bin/qmake"));
    }

    #[tokio::test]
    async fn merges_both_architectures() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::new()
            .root(dir.path())
            .arch(Arch::Universal)
            .version(ProductVersion::parse("2021.03.15-R3").unwrap())
            .build()
            .unwrap();
        let runner = ScriptedRunner::new().respond("makeuniversal", 0, "");
        let output = OutputManager::new(false, true);
        let bundler = Bundler::new(&settings, &runner, &output);

        merge_app(
            &bundler,
            Path::new("tools/makeuniversal/makeuniversal"),
            "Pingnoo.app",
            &settings.deploy_dir().join("Pingnoo.app"),
        )
        .await
        .unwrap();

        let command = &runner.commands()[0];
        assert!(command.contains("bin/universal/Deploy/Pingnoo.app"));
        assert!(command.contains("bin/x86_64/Release/Pingnoo.app"));
        assert!(command.contains("bin/arm64/Release/Pingnoo.app"));
    }
}
