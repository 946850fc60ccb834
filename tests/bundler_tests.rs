#[cfg(test)]
mod tests {
    use pingnoo_deploy::bundler::deps::{DependencyResolver, LddParser, ProviderParser, ProviderQuery};
    use pingnoo_deploy::bundler::template::PackageTemplate;
    use pingnoo_deploy::bundler::{
        Arch, BuildType, CommandOutput, CommandRunner, PackageType, ProductSettings, SettingsBuilder,
    };
    use pingnoo_deploy::ProductVersion;
    use std::path::Path;

    /// Answers `ldd` with a fixed listing and `dpkg -S` from a table.
    struct FakeHost;

    impl CommandRunner for FakeHost {
        async fn run(&self, command: &str) -> pingnoo_deploy::bundler::Result<CommandOutput> {
            let (code, text) = if command.starts_with("ldd ") {
                (
                    0,
                    "\tlinux-vdso.so.1 (0x00007ffd2a5f3000)\n\
                     \tlibQt5Core.so.5 => /lib/x86_64-linux-gnu/libQt5Core.so.5 (0x1)\n\
                     \tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x2)\n",
                )
            } else if command == "dpkg -S libQt5Core.so.5" {
                (0, "libqt5core5a:amd64: /usr/lib/x86_64-linux-gnu/libQt5Core.so.5\n")
            } else if command == "dpkg -S libc.so.6" {
                (0, "libc6:amd64: /lib/x86_64-linux-gnu/libc.so.6\n")
            } else {
                (1, "dpkg-query: no path found matching pattern\n")
            };
            Ok(CommandOutput {
                code,
                text: text.to_string(),
            })
        }
    }

    #[test]
    fn test_package_type_short_names() {
        assert_eq!(PackageType::Deb.short_name(), "deb");
        assert_eq!(PackageType::AppImage.short_name(), "appimage");
        assert_eq!(PackageType::WindowsInstaller.short_name(), "windows");
        assert_eq!(PackageType::Dmg.to_string(), "dmg");
    }

    #[test]
    fn test_settings_layout() {
        let settings = SettingsBuilder::new()
            .root("/work/pingnoo")
            .arch(Arch::Arm64)
            .build_type(BuildType::Debug)
            .version(ProductVersion::parse("2021.03.15-R3").unwrap())
            .build()
            .unwrap();

        assert_eq!(settings.build_dir(), Path::new("/work/pingnoo/bin/arm64/Debug"));
        assert_eq!(settings.deploy_dir(), Path::new("/work/pingnoo/bin/arm64/Deploy"));
        assert_eq!(settings.deployment_dir(), Path::new("/work/pingnoo/deployment"));
        assert_eq!(settings.product().package_name, "pingnoo");
    }

    #[test]
    fn test_settings_require_version() {
        let result = SettingsBuilder::new()
            .root("/work/pingnoo")
            .product(ProductSettings::default())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_version_fields() {
        let version = ProductVersion::parse("2021.03.15-R3").unwrap();
        assert_eq!(version.rpm_version(), "2021.03.15");
        assert_eq!(version.installer_version(), "21.03.15");
        assert_eq!(version.build(), Some("R3"));
    }

    #[test]
    fn test_template_rendering() {
        let template = PackageTemplate::parse(
            "control.in",
            "Package: pingnoo\nVersion: ${version}\nArchitecture: $arch\n",
        )
        .unwrap();
        let rendered = template
            .render(&[("version", "2021.03.15-R3"), ("arch", "amd64")])
            .unwrap();
        assert_eq!(
            rendered,
            "Package: pingnoo\nVersion: 2021.03.15-R3\nArchitecture: amd64\n"
        );
        assert!(template.render(&[("version", "1")]).is_err());
    }

    #[test]
    fn test_parsers_on_captured_output() {
        let ldd = LddParser::new().unwrap();
        let sonames = ldd.sonames("\tlibQt5Gui.so.5 => /usr/lib/libQt5Gui.so.5 (0x1)\n\t/lib64/ld-linux-x86-64.so.2 (0x2)\n");
        assert_eq!(sonames.into_iter().collect::<Vec<_>>(), vec!["libQt5Gui.so.5"]);

        let pacman = ProviderParser::new(ProviderQuery::Pacman).unwrap();
        assert_eq!(
            pacman.provider("usr/lib/libQt5Gui.so.5 is owned by extra/qt5-base 5.15.2-5 [installed]\n"),
            Some("qt5-base".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolver_maps_external_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("usr/local/bin/pingnoo");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("Pingnoo"), b"\x7fELF").unwrap();
        std::fs::write(bin.join("libComponentSystem.so"), b"\x7fELF").unwrap();

        let host = FakeHost;
        let resolver = DependencyResolver::new(&host, ProviderQuery::Dpkg).unwrap();
        let report = resolver.scan(&bin, dir.path()).await.unwrap();
        assert_eq!(report.artifacts().len(), 2);

        let deps = resolver.resolve(&report).await.unwrap();
        assert_eq!(deps.packages(), vec!["libc6".to_string(), "libqt5core5a".to_string()]);
        assert!(report.manifest().contains("usr/local/bin/pingnoo/Pingnoo"));
    }
}
