//! Socket lifecycle, statistics and address messages
//!
//! IPv4 addresses in connection state and NAT remappings go through the
//! numeric anonymizer. IPv6 and UDP local addresses are raw byte fields and
//! are forwarded as recorded.

use tracing::debug;

use super::HandlerResult;
use crate::anonymize::Anonymizer;
use crate::recording::Fields;
use crate::writer::{IngestWriter, Ipv6Bytes, VpcId};

pub(super) fn write<W>(name: &str, f: &Fields, anon: &mut Anonymizer, w: &mut W) -> HandlerResult
where
    W: IngestWriter + ?Sized,
{
    match name {
        "new_sock_info" => {
            let pid = f.u32("pid")?;
            let sk = f.u64("sk")?;
            debug!("write new_sock_info: pid {} sk {}", pid, sk);
            w.new_sock_info(pid, sk);
        }

        "set_state_ipv4" => {
            // read everything before touching the anonymizer so a malformed
            // record leaves the address map alone
            let dest = f.u32("dest")?;
            let src = f.u32("src")?;
            let dport = f.u16("dport")?;
            let sport = f.u16("sport")?;
            let sk = f.u64("sk")?;
            let tx_rx = f.u32("tx_rx")?;
            let dest = anon.anonymize_numeric(dest);
            let src = anon.anonymize_numeric(src);
            debug!(
                "write set_state_ipv4: dest {} src {} dport {} sport {} sk {} tx_rx {}",
                dest, src, dport, sport, sk, tx_rx
            );
            w.set_state_ipv4(dest, src, dport, sport, sk, tx_rx);
        }

        "set_state_ipv6" => {
            let dest: Ipv6Bytes = f.fixed("dest")?;
            let src: Ipv6Bytes = f.fixed("src")?;
            let dport = f.u16("dport")?;
            let sport = f.u16("sport")?;
            let sk = f.u64("sk")?;
            let tx_rx = f.u32("tx_rx")?;
            debug!(
                "write set_state_ipv6: dest {:?} src {:?} dport {} sport {} sk {} tx_rx {}",
                dest, src, dport, sport, sk, tx_rx
            );
            w.set_state_ipv6(&dest, &src, dport, sport, sk, tx_rx);
        }

        "socket_stats" => {
            let sk = f.u64("sk")?;
            let diff_bytes = f.u64("diff_bytes")?;
            let diff_delivered = f.u32("diff_delivered")?;
            let diff_retrans = f.u32("diff_retrans")?;
            let max_srtt = f.u32("max_srtt")?;
            let is_rx = f.u8("is_rx")?;
            debug!(
                "write socket_stats: sk {} diff_bytes {} diff_delivered {} diff_retrans {} max_srtt {} is_rx {}",
                sk, diff_bytes, diff_delivered, diff_retrans, max_srtt, is_rx
            );
            w.socket_stats(sk, diff_bytes, diff_delivered, diff_retrans, max_srtt, is_rx);
        }

        "nat_remapping" => {
            let sk = f.u64("sk")?;
            let src = f.u32("src")?;
            let dst = f.u32("dst")?;
            let sport = f.u16("sport")?;
            let dport = f.u16("dport")?;
            let src = anon.anonymize_numeric(src);
            let dst = anon.anonymize_numeric(dst);
            debug!(
                "write nat_remapping: sk {} src {} dst {} sport {} dport {}",
                sk, src, dst, sport, dport
            );
            w.nat_remapping(sk, src, dst, sport, dport);
        }

        "close_sock_info" => {
            let sk = f.u64("sk")?;
            debug!("write close_sock_info: sk {}", sk);
            w.close_sock_info(sk);
        }

        "tcp_reset" => {
            let sk = f.u64("sk")?;
            let is_rx = f.u8("is_rx")?;
            debug!("write tcp_reset: sk {} is_rx {}", sk, is_rx);
            w.tcp_reset(sk, is_rx);
        }

        "tcp_syn_timeout" => {
            let sk = f.u64("sk")?;
            debug!("write tcp_syn_timeout: sk {}", sk);
            w.tcp_syn_timeout(sk);
        }

        "http_response" => {
            let sk = f.u64("sk")?;
            let pid = f.u32("pid")?;
            let code = f.u16("code")?;
            let latency_ns = f.u64("latency_ns")?;
            let client_server = f.u8("client_server")?;
            debug!(
                "write http_response: sk {} pid {} code {} latency_ns {} client_server {}",
                sk, pid, code, latency_ns, client_server
            );
            w.http_response(sk, pid, code, latency_ns, client_server);
        }

        "private_ipv4_addr" => {
            let addr = f.u32("addr")?;
            let vpc_id: VpcId = f.fixed("vpc_id")?;
            debug!(
                "write private_ipv4_addr: addr {} vpc_id {}",
                addr,
                String::from_utf8_lossy(&vpc_id)
            );
            w.private_ipv4_addr(addr, &vpc_id);
        }

        "udp_new_socket" => {
            let pid = f.u32("pid")?;
            let sk_id = f.u32("sk_id")?;
            let laddr: Ipv6Bytes = f.fixed("laddr")?;
            let lport = f.u16("lport")?;
            debug!(
                "write udp_new_socket: pid {} sk_id {} laddr {:?} lport {}",
                pid, sk_id, laddr, lport
            );
            w.udp_new_socket(pid, sk_id, &laddr, lport);
        }

        "udp_destroy_socket" => {
            let sk_id = f.u32("sk_id")?;
            debug!("write udp_destroy_socket: sk_id {}", sk_id);
            w.udp_destroy_socket(sk_id);
        }

        "udp_stats_addr_changed_v4" => {
            let sk_id = f.u32("sk_id")?;
            let is_rx = f.u8("is_rx")?;
            let packets = f.u32("packets")?;
            let bytes = f.u32("bytes")?;
            let raddr = f.u32("raddr")?;
            let rport = f.u16("rport")?;
            debug!(
                "write udp_stats_addr_changed_v4: sk_id {} is_rx {} packets {} bytes {} raddr {} rport {}",
                sk_id, is_rx, packets, bytes, raddr, rport
            );
            w.udp_stats_addr_changed_v4(sk_id, is_rx, packets, bytes, raddr, rport);
        }

        "udp_stats_addr_changed_v6" => {
            let sk_id = f.u32("sk_id")?;
            let is_rx = f.u8("is_rx")?;
            let packets = f.u32("packets")?;
            let bytes = f.u32("bytes")?;
            let raddr: Ipv6Bytes = f.fixed("raddr")?;
            let rport = f.u16("rport")?;
            debug!(
                "write udp_stats_addr_changed_v6: sk_id {} is_rx {} packets {}, bytes {}, rport {}",
                sk_id, is_rx, packets, bytes, rport
            );
            w.udp_stats_addr_changed_v6(sk_id, is_rx, packets, bytes, &raddr, rport);
        }

        "udp_stats_addr_unchanged" => {
            let sk_id = f.u32("sk_id")?;
            let is_rx = f.u8("is_rx")?;
            let packets = f.u32("packets")?;
            let bytes = f.u32("bytes")?;
            debug!(
                "write udp_stats_addr_unchanged: sk_id {} is_rx {} packets {}, bytes {}",
                sk_id, is_rx, packets, bytes
            );
            w.udp_stats_addr_unchanged(sk_id, is_rx, packets, bytes);
        }

        "udp_stats_drops_changed" => {
            let sk_id = f.u32("sk_id")?;
            let drops = f.u32("drops")?;
            debug!("write udp_stats_drops_changed: sk_id {} drops {}", sk_id, drops);
            w.udp_stats_drops_changed(sk_id, drops);
        }

        "bpf_log" => {
            let filelineid = f.u64("filelineid")?;
            let code = f.u64("code")?;
            let arg0 = f.u64("arg0")?;
            let arg1 = f.u64("arg1")?;
            let arg2 = f.u64("arg2")?;
            debug!(
                "write bpf_log: filelineid {} code {} args {} {} {}",
                filelineid, code, arg0, arg1, arg2
            );
            w.bpf_log(filelineid, code, arg0, arg1, arg2);
        }

        _ => return Ok(false),
    }
    Ok(true)
}
