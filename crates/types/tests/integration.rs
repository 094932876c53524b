//! Integration tests for types

#[cfg(test)]
mod tests {
    use envbake_types::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn test_version_spec_complex() {
        let spec = VersionSpec::from_str(">=1.2.0,<2.0.0,!=1.5.0").unwrap();

        assert!(!spec.matches(&Version::parse("1.1.9").unwrap()));
        assert!(spec.matches(&Version::parse("1.2.0").unwrap()));
        assert!(!spec.matches(&Version::parse("1.5.0").unwrap())); // Excluded
        assert!(spec.matches(&Version::parse("1.5.1").unwrap()));
        assert!(!spec.matches(&Version::parse("2.0.0").unwrap()));
    }

    #[test]
    fn test_requirement_with_short_versions() {
        let req = Requirement::parse("PyOpenGL>=3.1,<4").unwrap();
        assert_eq!(req.key(), "pyopengl");
        assert!(req.version_spec.matches(&Version::new(3, 1, 7)));
        assert!(!req.version_spec.matches(&Version::new(4, 0, 0)));
    }

    #[test]
    fn test_step_kind_serialization() {
        let json = serde_json::to_string(&StepKind::RuntimePackageInstall).unwrap();
        assert_eq!(json, r#""language-runtime-package-install""#);

        let kind: StepKind = serde_json::from_str(r#""cache-clear""#).unwrap();
        assert_eq!(kind, StepKind::CacheClear);
    }

    #[test]
    fn test_step_from_toml_uses_defaults() {
        let step: Step = toml::from_str(
            r#"
            name = "install-framework"
            kind = "language-runtime-package-install"
            inputs = ["torch==2.1.0"]
            index_url = "https://download.pytorch.org/whl/cpu"
            "#,
        )
        .unwrap();

        assert!(step.idempotent);
        assert!(!step.upgrade);
        assert_eq!(step.variant().as_deref(), Some("cpu"));
        assert_eq!(step.requirements().unwrap()[0].name, "torch");
    }

    #[test]
    fn test_pipeline_lookup() {
        let pipeline = Pipeline::new("demo")
            .then(Step::system_install("base", ["ca-certificates"]))
            .then(Step::clear_cache("clean"));

        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.position("clean"), Some(1));
        assert_eq!(pipeline.without("base").len(), 1);
        assert_eq!(pipeline.steps_of(StepKind::CacheClear).count(), 1);
        assert!(pipeline.step("missing").is_none());
    }

    #[test]
    fn test_state_serialization_is_ordered() {
        let mut a = EnvironmentState::new();
        a.apply(StepEffects {
            os_packages: vec!["zlib1g".into(), "bash".into()],
            ..StepEffects::default()
        });
        let mut b = EnvironmentState::new();
        b.apply(StepEffects {
            os_packages: vec!["bash".into(), "zlib1g".into()],
            ..StepEffects::default()
        });

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_manifest_entrypoint() {
        let manifest = ImageManifest::freeze("ubuntu:22.04", "demo", "abc", EnvironmentState::new());
        assert_eq!(manifest.entrypoint, vec!["/bin/bash".to_string()]);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["baseImage"], "ubuntu:22.04");
    }

    proptest! {
        #[test]
        fn prop_exact_spec_matches_only_its_version(
            major in 0u64..50, minor in 0u64..50, patch in 0u64..50, bump in 1u64..5
        ) {
            let version = Version::new(major, minor, patch);
            let spec = VersionSpec::exact(version.clone());
            prop_assert!(spec.matches(&version));
            prop_assert!(!spec.matches(&Version::new(major, minor, patch + bump)));
            prop_assert_eq!(spec.to_string().parse::<VersionSpec>().unwrap(), spec);
        }

        #[test]
        fn prop_package_index_pins_parse_and_round_trip(
            major in 0u64..3000, minor in 0u64..50, extra in 0u64..20,
            number in 0u64..20, suffix in 0usize..5
        ) {
            let tail = [
                format!(".{extra}"),
                format!(".post{number}"),
                format!("rc{number}"),
                format!(".dev{number}"),
                format!("b{number}.post{extra}"),
            ];
            let raw = format!("{major}.{minor}.0{}", tail[suffix]);

            let requirement = Requirement::parse(&format!("pkg=={raw}")).unwrap();
            let version = parse_version(&raw).unwrap();
            prop_assert!(requirement.version_spec.matches(&version));
            prop_assert_eq!(requirement.version_spec.pinned(), Some(&version));

            let reparsed: VersionSpec = requirement.version_spec.to_string().parse().unwrap();
            prop_assert_eq!(reparsed, requirement.version_spec);
        }

        #[test]
        fn prop_post_releases_sort_between_releases(
            major in 0u64..3000, minor in 0u64..50, post in 0u64..20
        ) {
            let release = parse_version(&format!("{major}.{minor}")).unwrap();
            let post_release = parse_version(&format!("{major}.{minor}.post{post}")).unwrap();
            let next = parse_version(&format!("{major}.{}", minor + 1)).unwrap();
            prop_assert!(release < post_release);
            prop_assert!(post_release < next);
        }

        #[test]
        fn prop_apply_is_order_insensitive_for_packages(
            packages in proptest::collection::vec("[a-z][a-z0-9-]{0,8}", 0..12)
        ) {
            let mut forward = EnvironmentState::new();
            forward.apply(StepEffects { os_packages: packages.clone(), ..StepEffects::default() });

            let mut reversed_packages = packages;
            reversed_packages.reverse();
            let mut backward = EnvironmentState::new();
            backward.apply(StepEffects { os_packages: reversed_packages, ..StepEffects::default() });

            prop_assert_eq!(forward, backward);
        }
    }
}
