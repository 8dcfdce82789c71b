//! Status verification.
//!
//! The reconciliation loop rejects status responses that miss required
//! fields. The hollow runtime runs the same checks before answering, so a
//! malformed simulated record surfaces as [`Error::Validation`] instead of
//! corrupting the caller's caches.

use super::types::{ContainerStatus, PodSandboxStatus};
use crate::error::{Error, RecordKind, Result};

/// Verifies that all required fields are set in a sandbox status.
///
/// # Errors
///
/// [`Error::Validation`] if the id, metadata name/namespace/uid or creation
/// time is missing.
pub fn verify_sandbox_status(status: &PodSandboxStatus) -> Result<()> {
    let kind = RecordKind::Sandbox;

    if status.id.is_empty() {
        return Err(Error::validation(kind, "Id is not set"));
    }

    let Some(metadata) = &status.metadata else {
        return Err(Error::validation(kind, "Metadata is not set"));
    };

    if metadata.name.is_empty() || metadata.namespace.is_empty() || metadata.uid.is_empty() {
        return Err(Error::validation(
            kind,
            format!("Name, Namespace or Uid is not in metadata {metadata:?}"),
        ));
    }

    if status.created_at == 0 {
        return Err(Error::validation(kind, "CreatedAt is not set"));
    }

    Ok(())
}

/// Verifies that all required fields are set in a container status.
///
/// # Errors
///
/// [`Error::Validation`] if the id, metadata name, creation time, image or
/// image ref is missing.
pub fn verify_container_status(status: &ContainerStatus) -> Result<()> {
    let kind = RecordKind::Container;

    if status.id.is_empty() {
        return Err(Error::validation(kind, "Id is not set"));
    }

    let Some(metadata) = &status.metadata else {
        return Err(Error::validation(kind, "Metadata is not set"));
    };

    if metadata.name.is_empty() {
        return Err(Error::validation(
            kind,
            format!("Name is not in metadata {metadata:?}"),
        ));
    }

    if status.created_at == 0 {
        return Err(Error::validation(kind, "CreatedAt is not set"));
    }

    if status.image.as_ref().is_none_or(|i| i.image.is_empty()) {
        return Err(Error::validation(kind, "Image is not set"));
    }

    if status.image_ref.is_empty() {
        return Err(Error::validation(kind, "ImageRef is not set"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cri::types::{ContainerMetadata, ContainerState, ImageSpec, PodSandboxMetadata, PodSandboxState};
    use std::collections::HashMap;

    fn sandbox_status() -> PodSandboxStatus {
        PodSandboxStatus {
            id: "sb1".to_string(),
            metadata: Some(PodSandboxMetadata {
                name: "pod".to_string(),
                uid: "uid-1".to_string(),
                namespace: "default".to_string(),
                attempt: 0,
            }),
            state: PodSandboxState::SandboxReady,
            created_at: 1,
            network: None,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            runtime_handler: String::new(),
        }
    }

    fn container_status() -> ContainerStatus {
        ContainerStatus {
            id: "c1".to_string(),
            metadata: Some(ContainerMetadata {
                name: "app".to_string(),
                attempt: 0,
            }),
            state: ContainerState::ContainerRunning,
            created_at: 1,
            started_at: 1,
            finished_at: 0,
            exit_code: 0,
            image: Some(ImageSpec::new("nginx:1.25")),
            image_ref: "sha256:abc".to_string(),
            reason: String::new(),
            message: String::new(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            log_path: String::new(),
        }
    }

    fn assert_validation(result: Result<()>, needle: &str) {
        match result {
            Err(Error::Validation { reason, .. }) => {
                assert!(reason.contains(needle), "unexpected reason: {reason}")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_sandbox_status() {
        assert!(verify_sandbox_status(&sandbox_status()).is_ok());
    }

    #[test]
    fn test_sandbox_missing_fields() {
        let mut s = sandbox_status();
        s.id.clear();
        assert_validation(verify_sandbox_status(&s), "Id");

        let mut s = sandbox_status();
        s.metadata = None;
        assert_validation(verify_sandbox_status(&s), "Metadata");

        for field in ["name", "namespace", "uid"] {
            let mut s = sandbox_status();
            let m = s.metadata.as_mut().unwrap();
            match field {
                "name" => m.name.clear(),
                "namespace" => m.namespace.clear(),
                _ => m.uid.clear(),
            }
            assert_validation(verify_sandbox_status(&s), "Name, Namespace or Uid");
        }

        let mut s = sandbox_status();
        s.created_at = 0;
        assert_validation(verify_sandbox_status(&s), "CreatedAt");
    }

    #[test]
    fn test_valid_container_status() {
        assert!(verify_container_status(&container_status()).is_ok());
    }

    #[test]
    fn test_container_missing_fields() {
        let mut c = container_status();
        c.id.clear();
        assert_validation(verify_container_status(&c), "Id");

        let mut c = container_status();
        c.metadata = None;
        assert_validation(verify_container_status(&c), "Metadata");

        let mut c = container_status();
        c.metadata.as_mut().unwrap().name.clear();
        assert_validation(verify_container_status(&c), "Name");

        let mut c = container_status();
        c.created_at = 0;
        assert_validation(verify_container_status(&c), "CreatedAt");

        let mut c = container_status();
        c.image = None;
        assert_validation(verify_container_status(&c), "Image is not set");

        let mut c = container_status();
        c.image = Some(ImageSpec::new(""));
        assert_validation(verify_container_status(&c), "Image is not set");

        let mut c = container_status();
        c.image_ref.clear();
        assert_validation(verify_container_status(&c), "ImageRef");
    }
}
