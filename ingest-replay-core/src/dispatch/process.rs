//! Process lifecycle messages

use tracing::debug;

use super::HandlerResult;
use crate::anonymize::Anonymizer;
use crate::recording::Fields;
use crate::writer::IngestWriter;

pub(super) fn write<W>(name: &str, f: &Fields, anon: &mut Anonymizer, w: &mut W) -> HandlerResult
where
    W: IngestWriter + ?Sized,
{
    match name {
        "pid_info" => {
            let pid = f.u32("pid")?;
            let comm = anon.prefixed_comm(&f.text("comm")?);
            debug!("write pid_info: pid {} comm {}", pid, String::from_utf8_lossy(&comm));
            w.pid_info(pid, &comm);
        }

        "pid_close_info" => {
            let pid = f.u32("pid")?;
            let comm = anon.prefixed_comm(&f.text("comm")?);
            debug!("write pid_close_info: pid {} comm {}", pid, String::from_utf8_lossy(&comm));
            w.pid_close_info(pid, &comm);
        }

        "pid_info_create" => {
            let pid = f.u32("pid")?;
            let comm = anon.prefixed_comm(&f.text("comm")?);
            let cgroup = f.u64("cgroup")?;
            let parent_pid = f.i32("parent_pid")?;
            let cmdline = f.blob("cmdline")?;
            debug!(
                "write pid_info_create: pid {} cgroup {} parent_pid {} cmdline {}",
                pid,
                cgroup,
                parent_pid,
                String::from_utf8_lossy(&cmdline)
            );
            w.pid_info_create(pid, &comm, cgroup, parent_pid, &cmdline);
        }

        "pid_cgroup_move" => {
            let pid = f.u32("pid")?;
            let cgroup = f.u64("cgroup")?;
            debug!("write pid_cgroup_move: pid {} cgroup {}", pid, cgroup);
            w.pid_cgroup_move(pid, cgroup);
        }

        "pid_set_comm" => {
            let pid = f.u32("pid")?;
            let comm = anon.prefixed_comm(&f.text("comm")?);
            debug!("write pid_set_comm: pid {} comm {}", pid, String::from_utf8_lossy(&comm));
            w.pid_set_comm(pid, &comm);
        }

        "pid_set_cmdline" => {
            let pid = f.u32("pid")?;
            let cmdline = f.blob("cmdline")?;
            debug!("write pid_set_cmdline: pid {}", pid);
            w.pid_set_cmdline(pid, &cmdline);
        }

        "pid_exit" => {
            let reference = f.u64("_ref")?;
            let tgid = f.u32("tgid")?;
            let pid = f.u32("pid")?;
            let exit_code = f.i32("exit_code")?;
            debug!(
                "write pid_exit: _ref {} tgid {} pid {} exit_code {}",
                reference, tgid, pid, exit_code
            );
            w.pid_exit(reference, tgid, pid, exit_code);
        }

        "tracked_process_start" => {
            let reference = f.u64("_ref")?;
            debug!("write tracked_process_start: _ref {}", reference);
            w.tracked_process_start(reference);
        }

        "tracked_process_end" => {
            let reference = f.u64("_ref")?;
            debug!("write tracked_process_end: _ref {}", reference);
            w.tracked_process_end(reference);
        }

        "set_tgid" => {
            let reference = f.u64("_ref")?;
            let tgid = f.u32("tgid")?;
            debug!("write set_tgid: _ref {} tgid {}", reference, tgid);
            w.set_tgid(reference, tgid);
        }

        "set_cgroup" => {
            let reference = f.u64("_ref")?;
            let cgroup = f.u64("cgroup")?;
            debug!("write set_cgroup: _ref {} cgroup {}", reference, cgroup);
            w.set_cgroup(reference, cgroup);
        }

        "set_command" => {
            let reference = f.u64("_ref")?;
            let command = f.blob("command")?;
            debug!(
                "write set_command: _ref {} command {}",
                reference,
                String::from_utf8_lossy(&command)
            );
            w.set_command(reference, &command);
        }

        _ => return Ok(false),
    }
    Ok(true)
}
