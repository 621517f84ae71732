//! Builders for the single-line ASCII commands understood by the daemon's
//! admin socket.
//!
//! Every command is one space-separated line; the transport appends the
//! trailing newline. ACL and MAP identifiers are numeric and sent in the
//! daemon's `#<id>` form so they are never confused with pattern-file paths.

use std::fmt::Write;

/// Administrative state of a pool member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Normal mode, health checked and serving traffic.
    Ready,
    /// Out of rotation, health checks disabled.
    Maint,
    /// No new sessions, existing ones kept, still checked.
    Drain,
}

impl ServerState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServerState::Ready => "ready",
            ServerState::Maint => "maint",
            ServerState::Drain => "drain",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn show_stat() -> String {
    // -1 -1 -1 selects every proxy, every object type, every server
    "show stat -1 -1 -1".to_string()
}

#[must_use]
pub fn show_info() -> String {
    "show info".to_string()
}

#[must_use]
pub fn show_acl(acl: Option<u32>) -> String {
    match acl {
        Some(id) => format!("show acl #{id}"),
        None => "show acl".to_string(),
    }
}

#[must_use]
pub fn add_acl(acl: u32, pattern: &str) -> String {
    format!("add acl #{acl} {pattern}")
}

#[must_use]
pub fn del_acl(acl: u32, key: &str) -> String {
    format!("del acl #{acl} {}", hex_key(key))
}

#[must_use]
pub fn clear_acl(acl: u32) -> String {
    format!("clear acl #{acl}")
}

#[must_use]
pub fn get_acl(acl: u32, value: &str) -> String {
    format!("get acl #{acl} {value}")
}

#[must_use]
pub fn show_map(map: Option<u32>) -> String {
    match map {
        Some(id) => format!("show map #{id}"),
        None => "show map".to_string(),
    }
}

#[must_use]
pub fn add_map(map: u32, key: &str, value: &str) -> String {
    format!("add map #{map} {key} {value}")
}

#[must_use]
pub fn del_map(map: u32, key: &str) -> String {
    format!("del map #{map} {}", hex_key(key))
}

#[must_use]
pub fn clear_map(map: u32) -> String {
    format!("clear map #{map}")
}

#[must_use]
pub fn get_map(map: u32, value: &str) -> String {
    format!("get map #{map} {value}")
}

#[must_use]
pub fn set_map(map: u32, key: &str, value: &str) -> String {
    format!("set map #{map} {} {value}", hex_key(key))
}

#[must_use]
pub fn set_weight(pool: &str, server: &str, value: &str) -> String {
    format!("set weight {pool}/{server} {value}")
}

#[must_use]
pub fn set_server_state(pool: &str, server: &str, state: ServerState) -> String {
    format!("set server {pool}/{server} state {state}")
}

#[must_use]
pub fn set_server_addr(pool: &str, server: &str, addr: &str, port: Option<u16>) -> String {
    let mut cmd = format!("set server {pool}/{server} addr {addr}");
    if let Some(port) = port {
        // write! to a String cannot fail
        let _ = write!(cmd, " port {port}");
    }
    cmd
}

#[must_use]
pub fn set_maxconn_global(value: u64) -> String {
    format!("set maxconn global {value}")
}

#[must_use]
pub fn set_maxconn_frontend(name: &str, value: u64) -> String {
    format!("set maxconn frontend {name} {value}")
}

#[must_use]
pub fn set_rate_limit_connections(value: u64) -> String {
    format!("set rate-limit connections global {value}")
}

#[must_use]
pub fn set_rate_limit_sessions(value: u64) -> String {
    format!("set rate-limit sessions global {value}")
}

#[must_use]
pub fn set_rate_limit_ssl_sessions(value: u64) -> String {
    format!("set rate-limit ssl-sessions global {value}")
}

#[must_use]
pub fn enable_frontend(name: &str) -> String {
    format!("enable frontend {name}")
}

#[must_use]
pub fn disable_frontend(name: &str) -> String {
    format!("disable frontend {name}")
}

#[must_use]
pub fn shutdown_frontend(name: &str) -> String {
    format!("shutdown frontend {name}")
}

#[must_use]
pub fn shutdown_sessions(pool: &str, server: &str) -> String {
    format!("shutdown sessions server {pool}/{server}")
}

#[must_use]
pub fn clear_counters(all: bool) -> String {
    if all {
        "clear counters all".to_string()
    } else {
        "clear counters".to_string()
    }
}

/// ACL/MAP deletions accept either a key or the hex reference printed by the
/// show commands; hex references must be escaped with a leading `#`.
fn hex_key(key: &str) -> String {
    if key.starts_with("0x") {
        format!("#{key}")
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_stat_selects_everything() {
        assert_eq!(show_stat(), "show stat -1 -1 -1");
    }

    #[test]
    fn test_show_acl_with_and_without_id() {
        assert_eq!(show_acl(Some(4)), "show acl #4");
        assert_eq!(show_acl(None), "show acl");
    }

    #[test]
    fn test_add_del_acl() {
        assert_eq!(add_acl(4, "/foobar"), "add acl #4 /foobar");
        assert_eq!(del_acl(4, "/foobar"), "del acl #4 /foobar");
    }

    #[test]
    fn test_del_acl_escapes_hex_reference() {
        assert_eq!(del_acl(4, "0x238f790"), "del acl #4 #0x238f790");
    }

    #[test]
    fn test_map_commands() {
        assert_eq!(add_map(0, "9", "foo"), "add map #0 9 foo");
        assert_eq!(set_map(0, "0x1a78980", "new2"), "set map #0 #0x1a78980 new2");
        assert_eq!(del_map(0, "22"), "del map #0 22");
        assert_eq!(clear_map(0), "clear map #0");
        assert_eq!(get_map(0, "11"), "get map #0 11");
    }

    #[test]
    fn test_set_weight() {
        assert_eq!(set_weight("bk", "srv1", "20%"), "set weight bk/srv1 20%");
        assert_eq!(set_weight("bk", "srv1", "58"), "set weight bk/srv1 58");
    }

    #[test]
    fn test_set_server_state() {
        assert_eq!(
            set_server_state("bk", "srv1", ServerState::Drain),
            "set server bk/srv1 state drain"
        );
        assert_eq!(ServerState::Maint.to_string(), "maint");
    }

    #[test]
    fn test_set_server_addr_with_optional_port() {
        assert_eq!(
            set_server_addr("bk", "srv1", "10.0.0.8", None),
            "set server bk/srv1 addr 10.0.0.8"
        );
        assert_eq!(
            set_server_addr("bk", "srv1", "10.0.0.8", Some(8080)),
            "set server bk/srv1 addr 10.0.0.8 port 8080"
        );
    }

    #[test]
    fn test_global_commands() {
        assert_eq!(set_maxconn_global(5555), "set maxconn global 5555");
        assert_eq!(
            set_maxconn_frontend("www", 50000),
            "set maxconn frontend www 50000"
        );
        assert_eq!(
            set_rate_limit_connections(100),
            "set rate-limit connections global 100"
        );
        assert_eq!(
            set_rate_limit_ssl_sessions(200),
            "set rate-limit ssl-sessions global 200"
        );
        assert_eq!(clear_counters(false), "clear counters");
        assert_eq!(clear_counters(true), "clear counters all");
    }

    #[test]
    fn test_frontend_commands() {
        assert_eq!(enable_frontend("www"), "enable frontend www");
        assert_eq!(disable_frontend("www"), "disable frontend www");
        assert_eq!(shutdown_frontend("www"), "shutdown frontend www");
        assert_eq!(
            shutdown_sessions("bk", "srv1"),
            "shutdown sessions server bk/srv1"
        );
    }
}
