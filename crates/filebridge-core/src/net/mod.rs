//! 局域网地址解析
//!
//! 选出手机可以访问到的本机 IPv4 地址，并探测空闲端口。

use log::{debug, warn};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};

/// 找不到局域网地址时使用的占位地址
pub const PLACEHOLDER_IP: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub lan_ip: Ipv4Addr,
    pub port: u16,
}

/// 是否为私有网段地址 (RFC 1918)
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    private_rank(ip) > 0
}

/// 私有网段优先级: 192.168/16 > 10/8 > 172.16/12
fn private_rank(ip: Ipv4Addr) -> u8 {
    match ip.octets() {
        [192, 168, ..] => 3,
        [10, ..] => 2,
        [172, b, ..] if (16..=31).contains(&b) => 1,
        _ => 0,
    }
}

fn is_wireless(name: &str) -> bool {
    let name = name.to_lowercase();
    ["wi-fi", "wifi", "wlan", "wireless"]
        .iter()
        .any(|hint| name.contains(hint))
}

/// 从 (接口名, 地址) 列表中选出最合适的局域网地址
///
/// 无线接口优先，其次按私有网段排序；同优先级保留先出现的地址。
pub fn pick_lan_ip<'a, I>(candidates: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = (&'a str, Ipv4Addr)>,
{
    let mut best: Option<(u8, Ipv4Addr)> = None;
    for (name, ip) in candidates {
        if ip.is_loopback() {
            continue;
        }
        let rank = private_rank(ip);
        if rank == 0 {
            continue;
        }
        let priority = if is_wireless(name) { rank + 10 } else { rank };
        if best.is_none_or(|(p, _)| priority > p) {
            best = Some((priority, ip));
        }
    }
    best.map(|(_, ip)| ip)
}

/// 枚举本机网络接口并选出局域网地址
pub fn lan_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match get_if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Failed to list network interfaces: {}", e);
            return None;
        }
    };

    let candidates: Vec<(String, Ipv4Addr)> = interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.addr {
            get_if_addrs::IfAddr::V4(v4) => Some((iface.name, v4.ip)),
            get_if_addrs::IfAddr::V6(_) => None,
        })
        .collect();
    debug!("IPv4 interface candidates: {:?}", candidates);

    pick_lan_ip(candidates.iter().map(|(name, ip)| (name.as_str(), *ip)))
}

/// 绑定任意端口后读回系统分配的端口号
pub fn probe_free_port() -> std::io::Result<u16> {
    let probe = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
    Ok(probe.local_addr()?.port())
}

/// 解析监听地址
///
/// 找不到局域网地址时不会失败，而是返回 [`PLACEHOLDER_IP`]。
/// `preferred_port` 为 0 时探测一个空闲端口。
pub fn resolve(preferred_port: u16) -> ResolvedAddress {
    let lan_ip = lan_ipv4().unwrap_or_else(|| {
        warn!(
            "No private LAN IPv4 address found, advertising {}",
            PLACEHOLDER_IP
        );
        PLACEHOLDER_IP
    });

    let port = if preferred_port != 0 {
        preferred_port
    } else {
        probe_free_port().unwrap_or_else(|e| {
            warn!("Port probe failed: {}, letting the listener pick one", e);
            0
        })
    };

    ResolvedAddress { lan_ip, port }
}

#[cfg(test)]
mod tests;
