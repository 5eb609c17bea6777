//! 地址解析测试

use super::*;

// ============================================================================
// 私有网段判断
// ============================================================================

#[test]
fn test_private_ranges() {
    assert!(is_private_ipv4(Ipv4Addr::new(192, 168, 1, 20)));
    assert!(is_private_ipv4(Ipv4Addr::new(10, 0, 0, 5)));
    assert!(is_private_ipv4(Ipv4Addr::new(172, 16, 0, 1)));
    assert!(is_private_ipv4(Ipv4Addr::new(172, 31, 255, 254)));

    assert!(!is_private_ipv4(Ipv4Addr::new(172, 32, 0, 1)));
    assert!(!is_private_ipv4(Ipv4Addr::new(172, 15, 0, 1)));
    assert!(!is_private_ipv4(Ipv4Addr::new(8, 8, 8, 8)));
    assert!(!is_private_ipv4(Ipv4Addr::LOCALHOST));
}

// ============================================================================
// 候选地址选择
// ============================================================================

#[test]
fn test_pick_prefers_192_168() {
    let picked = pick_lan_ip([
        ("eth1", Ipv4Addr::new(172, 20, 0, 2)),
        ("eth0", Ipv4Addr::new(10, 1, 2, 3)),
        ("eth2", Ipv4Addr::new(192, 168, 0, 9)),
    ]);
    assert_eq!(picked, Some(Ipv4Addr::new(192, 168, 0, 9)));
}

#[test]
fn test_pick_prefers_wireless_interface() {
    let picked = pick_lan_ip([
        ("eth0", Ipv4Addr::new(192, 168, 1, 10)),
        ("wlan0", Ipv4Addr::new(10, 0, 0, 42)),
    ]);
    assert_eq!(picked, Some(Ipv4Addr::new(10, 0, 0, 42)));
}

#[test]
fn test_pick_skips_public_and_loopback() {
    let picked = pick_lan_ip([
        ("lo", Ipv4Addr::LOCALHOST),
        ("eth0", Ipv4Addr::new(203, 0, 113, 7)),
    ]);
    assert_eq!(picked, None);
}

#[test]
fn test_pick_keeps_first_on_tie() {
    let picked = pick_lan_ip([
        ("eth0", Ipv4Addr::new(192, 168, 1, 10)),
        ("eth1", Ipv4Addr::new(192, 168, 2, 10)),
    ]);
    assert_eq!(picked, Some(Ipv4Addr::new(192, 168, 1, 10)));
}

// ============================================================================
// 端口
// ============================================================================

#[test]
fn test_probe_free_port() {
    let port = probe_free_port().unwrap();
    assert_ne!(port, 0);
}

#[test]
fn test_resolve_keeps_preferred_port() {
    let resolved = resolve(48123);
    assert_eq!(resolved.port, 48123);
}

#[test]
fn test_resolve_never_fails() {
    let resolved = resolve(0);
    assert!(resolved.lan_ip == PLACEHOLDER_IP || is_private_ipv4(resolved.lan_ip));
}
