//! Pod and container identifiers embedded in cgroup paths
//!
//! Handles the layouts container runtimes actually produce:
//!
//! - cgroupfs driver: `/kubepods/burstable/pod<uid>/<container-id>`
//! - systemd driver: `/kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod<uid_with_underscores>.slice/cri-containerd-<container-id>.scope`
//! - plain docker: `/docker/<container-id>` or `docker-<container-id>.scope`

use once_cell::sync::Lazy;
use regex::Regex;

static POD_UID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"pod([0-9a-f]{8}[-_][0-9a-f]{4}[-_][0-9a-f]{4}[-_][0-9a-f]{4}[-_][0-9a-f]{12})",
    )
    .expect("pod uid pattern is valid")
});

static CONTAINER_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[/\-])([0-9a-f]{64})(?:\.scope)?(?:/|$)")
        .expect("container id pattern is valid")
});

/// Identifiers found in a cgroup path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupIds {
    /// Kubernetes pod UID as written in the path (dashes or underscores)
    pub pod_id: Option<String>,
    /// 64-hex container ID
    pub container_id: Option<String>,
}

impl CgroupIds {
    /// Extract whatever identifiers `path` carries
    pub fn parse(path: &str) -> Self {
        let pod_id = POD_UID
            .captures(path)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let container_id = CONTAINER_ID
            .captures(path)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        Self {
            pod_id,
            container_id,
        }
    }

    /// True when neither identifier was found
    pub fn is_empty(&self) -> bool {
        self.pod_id.is_none() && self.container_id.is_none()
    }
}
