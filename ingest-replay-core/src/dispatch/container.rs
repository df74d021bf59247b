//! Cgroup and container metadata messages
//!
//! Cgroup paths and the container/pod IDs repeated in metadata messages get
//! the same session-prefix substitution, so a replayed container still lines
//! up with its cgroup.

use tracing::debug;

use super::HandlerResult;
use crate::anonymize::Anonymizer;
use crate::recording::{fixed_bytes, Fields};
use crate::writer::{CgroupName, IngestWriter};

pub(super) fn write<W>(name: &str, f: &Fields, anon: &mut Anonymizer, w: &mut W) -> HandlerResult
where
    W: IngestWriter + ?Sized,
{
    match name {
        "cgroup_create" => {
            let cgroup = f.u64("cgroup")?;
            let cgroup_parent = f.u64("cgroup_parent")?;
            let cgroup_name = anon.anonymize_cgroup_name(&f.text("name")?);
            let wire_name: CgroupName = fixed_bytes(cgroup_name.as_bytes());
            debug!(
                "write cgroup_create: cgroup {} cgroup_parent {} name {}",
                cgroup, cgroup_parent, cgroup_name
            );
            w.cgroup_create(cgroup, cgroup_parent, &wire_name);
        }

        "cgroup_close" => {
            let cgroup = f.u64("cgroup")?;
            debug!("write cgroup_close: cgroup {}", cgroup);
            w.cgroup_close(cgroup);
        }

        "container_metadata" => {
            let cgroup = f.u64("cgroup")?;
            let id = f.text("id")?;
            let id = anon.anonymize_substring(&id, &id);
            let name = f.blob("name")?;
            let image = f.blob("image")?;
            let ip_addr = f.blob("ip_addr")?;
            let cluster = f.blob("cluster")?;
            let container_name = f.blob("container_name")?;
            let task_family = f.blob("task_family")?;
            let task_version = f.blob("task_version")?;
            let ns = f.blob("ns")?;
            debug!("write container_metadata: cgroup {} id {}", cgroup, id);
            w.container_metadata(
                cgroup,
                id.as_bytes(),
                &name,
                &image,
                &ip_addr,
                &cluster,
                &container_name,
                &task_family,
                &task_version,
                &ns,
            );
        }

        "k8s_metadata" => {
            let cgroup = f.u64("cgroup")?;
            let container_name = f.blob("container_name")?;
            let pod_name = f.blob("pod_name")?;
            let pod_ns = f.blob("pod_ns")?;
            let pod_uid = f.text("pod_uid")?;
            let pod_uid = anon.anonymize_substring(&pod_uid, &pod_uid);
            let sandbox_uid = f.text("sandbox_uid")?;
            let sandbox_uid = anon.anonymize_substring(&sandbox_uid, &sandbox_uid);
            debug!(
                "write k8s_metadata: cgroup {} pod_uid {} sandbox_uid {}",
                cgroup, pod_uid, sandbox_uid
            );
            w.k8s_metadata(
                cgroup,
                &container_name,
                &pod_name,
                &pod_ns,
                pod_uid.as_bytes(),
                sandbox_uid.as_bytes(),
            );
        }

        "k8s_metadata_port" => {
            let cgroup = f.u64("cgroup")?;
            let port = f.u16("port")?;
            let protocol = f.u8("protocol")?;
            let port_name = f.blob("name")?;
            debug!(
                "write k8s_metadata_port: cgroup {} port {} protocol {}",
                cgroup, port, protocol
            );
            w.k8s_metadata_port(cgroup, port, protocol, &port_name);
        }

        "nomad_metadata" => {
            let cgroup = f.u64("cgroup")?;
            let ns = f.blob("ns")?;
            let group_name = f.blob("group_name")?;
            let task_name = f.blob("task_name")?;
            let job_name = f.blob("job_name")?;
            debug!("write nomad_metadata: cgroup {}", cgroup);
            w.nomad_metadata(cgroup, &ns, &group_name, &task_name, &job_name);
        }

        _ => return Ok(false),
    }
    Ok(true)
}
