//! Downstream write interface
//!
//! One method per ingest message, with the parameters in wire order. Calls
//! only enqueue; getting the bytes onto the network is the transport's job
//! and happens on flush.

mod json;

pub use json::{IngestMessage, JsonLinesWriter};

/// Kernel `comm` width
pub type Comm = [u8; 16];

/// Raw IPv6 address bytes
pub type Ipv6Bytes = [u8; 16];

/// Cgroup name as carried on the wire
pub type CgroupName = [u8; 256];

/// VPC identifier as carried on the wire
pub type VpcId = [u8; 22];

/// Writer for kernel-collector ingest messages
pub trait IngestWriter {
    // process lifecycle

    fn pid_info(&mut self, pid: u32, comm: &Comm);

    fn pid_close_info(&mut self, pid: u32, comm: &Comm);

    fn pid_info_create(
        &mut self,
        pid: u32,
        comm: &Comm,
        cgroup: u64,
        parent_pid: i32,
        cmdline: &[u8],
    );

    fn pid_cgroup_move(&mut self, pid: u32, cgroup: u64);

    fn pid_set_comm(&mut self, pid: u32, comm: &Comm);

    fn pid_set_cmdline(&mut self, pid: u32, cmdline: &[u8]);

    fn pid_exit(&mut self, reference: u64, tgid: u32, pid: u32, exit_code: i32);

    fn tracked_process_start(&mut self, reference: u64);

    fn tracked_process_end(&mut self, reference: u64);

    fn set_tgid(&mut self, reference: u64, tgid: u32);

    fn set_cgroup(&mut self, reference: u64, cgroup: u64);

    fn set_command(&mut self, reference: u64, command: &[u8]);

    // cgroups and container metadata

    fn cgroup_create(&mut self, cgroup: u64, cgroup_parent: u64, name: &CgroupName);

    fn cgroup_close(&mut self, cgroup: u64);

    #[allow(clippy::too_many_arguments)]
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
    );

    fn k8s_metadata(
        &mut self,
        cgroup: u64,
        container_name: &[u8],
        pod_name: &[u8],
        pod_ns: &[u8],
        pod_uid: &[u8],
        sandbox_uid: &[u8],
    );

    fn k8s_metadata_port(&mut self, cgroup: u64, port: u16, protocol: u8, name: &[u8]);

    fn nomad_metadata(
        &mut self,
        cgroup: u64,
        ns: &[u8],
        group_name: &[u8],
        task_name: &[u8],
        job_name: &[u8],
    );

    // TCP sockets

    fn new_sock_info(&mut self, pid: u32, sk: u64);

    fn set_state_ipv4(&mut self, dest: u32, src: u32, dport: u16, sport: u16, sk: u64, tx_rx: u32);

    fn set_state_ipv6(
        &mut self,
        dest: &Ipv6Bytes,
        src: &Ipv6Bytes,
        dport: u16,
        sport: u16,
        sk: u64,
        tx_rx: u32,
    );

    fn socket_stats(
        &mut self,
        sk: u64,
        diff_bytes: u64,
        diff_delivered: u32,
        diff_retrans: u32,
        max_srtt: u32,
        is_rx: u8,
    );

    fn nat_remapping(&mut self, sk: u64, src: u32, dst: u32, sport: u16, dport: u16);

    fn close_sock_info(&mut self, sk: u64);

    fn tcp_reset(&mut self, sk: u64, is_rx: u8);

    fn tcp_syn_timeout(&mut self, sk: u64);

    fn http_response(&mut self, sk: u64, pid: u32, code: u16, latency_ns: u64, client_server: u8);

    fn private_ipv4_addr(&mut self, addr: u32, vpc_id: &VpcId);

    // UDP sockets

    fn udp_new_socket(&mut self, pid: u32, sk_id: u32, laddr: &Ipv6Bytes, lport: u16);

    fn udp_destroy_socket(&mut self, sk_id: u32);

    fn udp_stats_addr_changed_v4(
        &mut self,
        sk_id: u32,
        is_rx: u8,
        packets: u32,
        bytes: u32,
        raddr: u32,
        rport: u16,
    );

    fn udp_stats_addr_changed_v6(
        &mut self,
        sk_id: u32,
        is_rx: u8,
        packets: u32,
        bytes: u32,
        raddr: &Ipv6Bytes,
        rport: u16,
    );

    fn udp_stats_addr_unchanged(&mut self, sk_id: u32, is_rx: u8, packets: u32, bytes: u32);

    fn udp_stats_drops_changed(&mut self, sk_id: u32, drops: u32);

    // agent diagnostics

    fn bpf_log(&mut self, filelineid: u64, code: u64, arg0: u64, arg1: u64, arg2: u64);
}
