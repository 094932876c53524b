//! Integration tests for error types

#[cfg(test)]
mod tests {
    use envbake_errors::*;

    #[test]
    fn test_error_conversion() {
        let err: ProvisioningError = PackageResolutionError::PackageNotFound {
            step: "install-interpreter-3.10".into(),
            package: "python3.10".into(),
        }
        .into();
        assert!(matches!(err, ProvisioningError::PackageResolution(_)));
        assert_eq!(err.failing_step(), Some("install-interpreter-3.10"));
    }

    #[test]
    fn test_error_display() {
        let err = FilesystemError::MissingContextPath {
            step: "copy-project-source".into(),
            path: "setup.py".into(),
        };
        assert_eq!(
            err.to_string(),
            "step `copy-project-source`: build context is missing setup.py"
        );
    }

    #[test]
    fn test_installer_status_is_propagated() {
        let err: ProvisioningError = PackageResolutionError::InstallerFailed {
            step: "install-rendering-libs".into(),
            command: "apt-get install".into(),
            status: Some(100),
            message: "Unable to locate package".into(),
        }
        .into();
        assert_eq!(err.exit_code(), 100);
        assert!(err.to_string().contains("with exit status 100"));
    }

    #[test]
    fn test_exit_code_defaults() {
        let ordering: ProvisioningError = OrderingViolationError::MissingPrerequisite {
            step: "install-framework".into(),
            index: 0,
            requirement: "a selected interpreter".into(),
        }
        .into();
        assert_eq!(ordering.exit_code(), 1);
        assert_eq!(ProvisioningError::Cancelled.exit_code(), 130);

        let no_status: ProvisioningError = PackageResolutionError::InstallerFailed {
            step: "s".into(),
            command: "pip".into(),
            status: None,
            message: "killed".into(),
        }
        .into();
        assert_eq!(no_status.exit_code(), 1);
    }

    #[test]
    fn test_user_facing_codes() {
        let err: ProvisioningError = OrderingViolationError::AfterCacheClear {
            step: "install-late".into(),
            index: 4,
            cache_clear: "clear-cache".into(),
        }
        .into();
        assert_eq!(err.user_code(), Some("ordering.after_cache_clear"));
        assert!(err.user_hint().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_clone() {
        let err = StepError::NotIdempotent {
            step: "bootstrap-package-manager".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: ProvisioningError = io_err.into();
        assert!(matches!(
            err,
            ProvisioningError::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                ..
            }
        ));
        assert_eq!(err.failing_step(), None);
    }

    #[test]
    fn test_in_step_attributes_stepless_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "dangling link");
        let err = ProvisioningError::from(io_err).in_step("copy-project-source");
        assert_eq!(err.failing_step(), Some("copy-project-source"));
        assert_eq!(err.user_code(), Some("error.io"));
        assert!(err.is_retryable());
        assert!(err.user_message().starts_with("step `copy-project-source`"));

        let internal = ProvisioningError::internal("bad pip list").in_step("install-framework");
        assert_eq!(internal.failing_step(), Some("install-framework"));
        assert_eq!(internal.exit_code(), 1);
    }

    #[test]
    fn test_in_step_keeps_existing_attribution() {
        let err: ProvisioningError = StepError::NotIdempotent {
            step: "bootstrap-package-manager".into(),
        }
        .into();
        let err = err.in_step("other");
        assert!(matches!(err, ProvisioningError::Step(_)));
        assert_eq!(err.failing_step(), Some("bootstrap-package-manager"));

        let cancelled = ProvisioningError::Cancelled.in_step("other");
        assert_eq!(cancelled.exit_code(), 130);
    }
}
