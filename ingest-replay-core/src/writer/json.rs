//! Newline-delimited JSON ingest writer
//!
//! Each write becomes one `{"name", "timestamp", "data"}` object on its own
//! line, the same shape the recordings use, so replayed output can be
//! captured and replayed again.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{CgroupName, Comm, IngestWriter, Ipv6Bytes, VpcId};

/// One encoded ingest message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestMessage {
    /// Message name
    pub name: String,

    /// Emission time in nanoseconds since the Unix epoch
    pub timestamp: u64,

    /// Message fields
    pub data: Map<String, Value>,
}

/// Buffers encoded messages until the transport drains them
#[derive(Debug, Default)]
pub struct JsonLinesWriter {
    buffer: Vec<u8>,
    pending: usize,
    written: u64,
}

impl JsonLinesWriter {
    /// Create a writer with an initial buffer capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            pending: 0,
            written: 0,
        }
    }

    /// Bytes waiting to be flushed
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Messages waiting to be flushed
    pub fn pending_messages(&self) -> usize {
        self.pending
    }

    /// Messages written over the writer's lifetime
    pub fn total_written(&self) -> u64 {
        self.written
    }

    /// Take the buffered bytes, leaving the writer empty
    pub fn take_buffer(&mut self) -> Vec<u8> {
        self.pending = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Drop anything not yet flushed
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.pending = 0;
    }

    /// Decode the buffered messages without draining them
    pub fn peek_messages(&self) -> serde_json::Result<Vec<IngestMessage>> {
        Self::decode(&self.buffer)
    }

    /// Decode a buffer produced by this writer
    pub fn decode(buffer: &[u8]) -> serde_json::Result<Vec<IngestMessage>> {
        serde_json::Deserializer::from_slice(buffer)
            .into_iter::<IngestMessage>()
            .collect()
    }

    fn emit(&mut self, name: &str, data: Value) {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let message = IngestMessage {
            name: name.to_string(),
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64,
            data,
        };
        // Serializing a map of plain values cannot fail.
        if serde_json::to_writer(&mut self.buffer, &message).is_ok() {
            self.buffer.push(b'\n');
            self.pending += 1;
            self.written += 1;
        }
    }
}

/// Fixed-width text fields end at the first NUL
fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn blob(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl IngestWriter for JsonLinesWriter {
    fn pid_info(&mut self, pid: u32, comm: &Comm) {
        self.emit("pid_info", json!({"pid": pid, "comm": text(comm)}));
    }

    fn pid_close_info(&mut self, pid: u32, comm: &Comm) {
        self.emit("pid_close_info", json!({"pid": pid, "comm": text(comm)}));
    }

    fn pid_info_create(
        &mut self,
        pid: u32,
        comm: &Comm,
        cgroup: u64,
        parent_pid: i32,
        cmdline: &[u8],
    ) {
        self.emit(
            "pid_info_create",
            json!({
                "pid": pid,
                "comm": text(comm),
                "cgroup": cgroup,
                "parent_pid": parent_pid,
                "cmdline": blob(cmdline),
            }),
        );
    }

    fn pid_cgroup_move(&mut self, pid: u32, cgroup: u64) {
        self.emit("pid_cgroup_move", json!({"pid": pid, "cgroup": cgroup}));
    }

    fn pid_set_comm(&mut self, pid: u32, comm: &Comm) {
        self.emit("pid_set_comm", json!({"pid": pid, "comm": text(comm)}));
    }

    fn pid_set_cmdline(&mut self, pid: u32, cmdline: &[u8]) {
        self.emit("pid_set_cmdline", json!({"pid": pid, "cmdline": blob(cmdline)}));
    }

    fn pid_exit(&mut self, reference: u64, tgid: u32, pid: u32, exit_code: i32) {
        self.emit(
            "pid_exit",
            json!({"_ref": reference, "tgid": tgid, "pid": pid, "exit_code": exit_code}),
        );
    }

    fn tracked_process_start(&mut self, reference: u64) {
        self.emit("tracked_process_start", json!({"_ref": reference}));
    }

    fn tracked_process_end(&mut self, reference: u64) {
        self.emit("tracked_process_end", json!({"_ref": reference}));
    }

    fn set_tgid(&mut self, reference: u64, tgid: u32) {
        self.emit("set_tgid", json!({"_ref": reference, "tgid": tgid}));
    }

    fn set_cgroup(&mut self, reference: u64, cgroup: u64) {
        self.emit("set_cgroup", json!({"_ref": reference, "cgroup": cgroup}));
    }

    fn set_command(&mut self, reference: u64, command: &[u8]) {
        self.emit("set_command", json!({"_ref": reference, "command": blob(command)}));
    }

    fn cgroup_create(&mut self, cgroup: u64, cgroup_parent: u64, name: &CgroupName) {
        self.emit(
            "cgroup_create",
            json!({"cgroup": cgroup, "cgroup_parent": cgroup_parent, "name": text(name)}),
        );
    }

    fn cgroup_close(&mut self, cgroup: u64) {
        self.emit("cgroup_close", json!({"cgroup": cgroup}));
    }

    fn container_metadata(
        &mut self,
        cgroup: u64,
        id: &[u8],
        name: &[u8],
        image: &[u8],
        ip_addr: &[u8],
        cluster: &[u8],
        container_name: &[u8],
        task_family: &[u8],
        task_version: &[u8],
        ns: &[u8],
    ) {
        self.emit(
            "container_metadata",
            json!({
                "cgroup": cgroup,
                "id": blob(id),
                "name": blob(name),
                "image": blob(image),
                "ip_addr": blob(ip_addr),
                "cluster": blob(cluster),
                "container_name": blob(container_name),
                "task_family": blob(task_family),
                "task_version": blob(task_version),
                "ns": blob(ns),
            }),
        );
    }

    fn k8s_metadata(
        &mut self,
        cgroup: u64,
        container_name: &[u8],
        pod_name: &[u8],
        pod_ns: &[u8],
        pod_uid: &[u8],
        sandbox_uid: &[u8],
    ) {
        self.emit(
            "k8s_metadata",
            json!({
                "cgroup": cgroup,
                "container_name": blob(container_name),
                "pod_name": blob(pod_name),
                "pod_ns": blob(pod_ns),
                "pod_uid": blob(pod_uid),
                "sandbox_uid": blob(sandbox_uid),
            }),
        );
    }

    fn k8s_metadata_port(&mut self, cgroup: u64, port: u16, protocol: u8, name: &[u8]) {
        self.emit(
            "k8s_metadata_port",
            json!({"cgroup": cgroup, "port": port, "protocol": protocol, "name": blob(name)}),
        );
    }

    fn nomad_metadata(
        &mut self,
        cgroup: u64,
        ns: &[u8],
        group_name: &[u8],
        task_name: &[u8],
        job_name: &[u8],
    ) {
        self.emit(
            "nomad_metadata",
            json!({
                "cgroup": cgroup,
                "ns": blob(ns),
                "group_name": blob(group_name),
                "task_name": blob(task_name),
                "job_name": blob(job_name),
            }),
        );
    }

    fn new_sock_info(&mut self, pid: u32, sk: u64) {
        self.emit("new_sock_info", json!({"pid": pid, "sk": sk}));
    }

    fn set_state_ipv4(&mut self, dest: u32, src: u32, dport: u16, sport: u16, sk: u64, tx_rx: u32) {
        self.emit(
            "set_state_ipv4",
            json!({
                "dest": dest,
                "src": src,
                "dport": dport,
                "sport": sport,
                "sk": sk,
                "tx_rx": tx_rx,
            }),
        );
    }

    fn set_state_ipv6(
        &mut self,
        dest: &Ipv6Bytes,
        src: &Ipv6Bytes,
        dport: u16,
        sport: u16,
        sk: u64,
        tx_rx: u32,
    ) {
        self.emit(
            "set_state_ipv6",
            json!({
                "dest": dest,
                "src": src,
                "dport": dport,
                "sport": sport,
                "sk": sk,
                "tx_rx": tx_rx,
            }),
        );
    }

    fn socket_stats(
        &mut self,
        sk: u64,
        diff_bytes: u64,
        diff_delivered: u32,
        diff_retrans: u32,
        max_srtt: u32,
        is_rx: u8,
    ) {
        self.emit(
            "socket_stats",
            json!({
                "sk": sk,
                "diff_bytes": diff_bytes,
                "diff_delivered": diff_delivered,
                "diff_retrans": diff_retrans,
                "max_srtt": max_srtt,
                "is_rx": is_rx,
            }),
        );
    }

    fn nat_remapping(&mut self, sk: u64, src: u32, dst: u32, sport: u16, dport: u16) {
        self.emit(
            "nat_remapping",
            json!({"sk": sk, "src": src, "dst": dst, "sport": sport, "dport": dport}),
        );
    }

    fn close_sock_info(&mut self, sk: u64) {
        self.emit("close_sock_info", json!({"sk": sk}));
    }

    fn tcp_reset(&mut self, sk: u64, is_rx: u8) {
        self.emit("tcp_reset", json!({"sk": sk, "is_rx": is_rx}));
    }

    fn tcp_syn_timeout(&mut self, sk: u64) {
        self.emit("tcp_syn_timeout", json!({"sk": sk}));
    }

    fn http_response(&mut self, sk: u64, pid: u32, code: u16, latency_ns: u64, client_server: u8) {
        self.emit(
            "http_response",
            json!({
                "sk": sk,
                "pid": pid,
                "code": code,
                "latency_ns": latency_ns,
                "client_server": client_server,
            }),
        );
    }

    fn private_ipv4_addr(&mut self, addr: u32, vpc_id: &VpcId) {
        self.emit("private_ipv4_addr", json!({"addr": addr, "vpc_id": text(vpc_id)}));
    }

    fn udp_new_socket(&mut self, pid: u32, sk_id: u32, laddr: &Ipv6Bytes, lport: u16) {
        self.emit(
            "udp_new_socket",
            json!({"pid": pid, "sk_id": sk_id, "laddr": laddr, "lport": lport}),
        );
    }

    fn udp_destroy_socket(&mut self, sk_id: u32) {
        self.emit("udp_destroy_socket", json!({"sk_id": sk_id}));
    }

    fn udp_stats_addr_changed_v4(
        &mut self,
        sk_id: u32,
        is_rx: u8,
        packets: u32,
        bytes: u32,
        raddr: u32,
        rport: u16,
    ) {
        self.emit(
            "udp_stats_addr_changed_v4",
            json!({
                "sk_id": sk_id,
                "is_rx": is_rx,
                "packets": packets,
                "bytes": bytes,
                "raddr": raddr,
                "rport": rport,
            }),
        );
    }

    fn udp_stats_addr_changed_v6(
        &mut self,
        sk_id: u32,
        is_rx: u8,
        packets: u32,
        bytes: u32,
        raddr: &Ipv6Bytes,
        rport: u16,
    ) {
        self.emit(
            "udp_stats_addr_changed_v6",
            json!({
                "sk_id": sk_id,
                "is_rx": is_rx,
                "packets": packets,
                "bytes": bytes,
                "raddr": raddr,
                "rport": rport,
            }),
        );
    }

    fn udp_stats_addr_unchanged(&mut self, sk_id: u32, is_rx: u8, packets: u32, bytes: u32) {
        self.emit(
            "udp_stats_addr_unchanged",
            json!({"sk_id": sk_id, "is_rx": is_rx, "packets": packets, "bytes": bytes}),
        );
    }

    fn udp_stats_drops_changed(&mut self, sk_id: u32, drops: u32) {
        self.emit("udp_stats_drops_changed", json!({"sk_id": sk_id, "drops": drops}));
    }

    fn bpf_log(&mut self, filelineid: u64, code: u64, arg0: u64, arg1: u64, arg2: u64) {
        self.emit(
            "bpf_log",
            json!({
                "filelineid": filelineid,
                "code": code,
                "arg0": arg0,
                "arg1": arg1,
                "arg2": arg2,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_decode() {
        let mut writer = JsonLinesWriter::with_capacity(64);
        writer.new_sock_info(1072, 99);
        writer.close_sock_info(99);

        assert_eq!(writer.pending_messages(), 2);
        let messages = writer.peek_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].name, "new_sock_info");
        assert_eq!(messages[0].data["pid"], 1072);
        assert_eq!(messages[1].data["sk"], 99);

        let bytes = writer.take_buffer();
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 2);
        assert_eq!(writer.pending_bytes(), 0);
        assert_eq!(writer.total_written(), 2);
    }

    #[test]
    fn test_fixed_width_text_stops_at_nul() {
        let mut writer = JsonLinesWriter::default();
        let mut comm = [0u8; 16];
        comm[..4].copy_from_slice(b"bash");
        writer.pid_info(7, &comm);

        let messages = writer.peek_messages().unwrap();
        assert_eq!(messages[0].data["comm"], "bash");
    }

    #[test]
    fn test_ipv6_bytes_are_arrays() {
        let mut writer = JsonLinesWriter::default();
        let addr = [0xfeu8, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        writer.udp_new_socket(1, 2, &addr, 53);

        let messages = writer.peek_messages().unwrap();
        assert_eq!(messages[0].data["laddr"][0], 0xfe);
        assert_eq!(messages[0].data["laddr"].as_array().map(|a| a.len()), Some(16));
    }

    #[test]
    fn test_discard() {
        let mut writer = JsonLinesWriter::default();
        writer.tcp_syn_timeout(4);
        writer.discard();
        assert_eq!(writer.pending_messages(), 0);
        assert!(writer.peek_messages().unwrap().is_empty());
    }
}
