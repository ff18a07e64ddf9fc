use std::path::Path;

use regex::Regex;
use tracing::{info, warn};

use crate::cmd::command::{NetcheckCommand, command_to_string};

const LOOPBACK_INTERFACE: &str = "lo";

/// One interface record parsed out of `ip a`-style text. Transient, only
/// lives for the duration of a diagnostic pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInterface {
    pub name: String,
    pub up: bool,
    pub ips: Vec<String>,
}

/// Non-loopback interface counts derived from a parsed listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSummary {
    pub up_count: usize,
    pub with_ip_count: usize,
}

/// Parses line-oriented interface-listing text into interface records.
///
/// A line matching `^\d+:\s+\w+:` opens a new record; its name is the second
/// whitespace token with the trailing colon stripped. Up-state is a literal
/// "UP" substring match on the header line (it targets `<...,UP,...>` flag
/// lists and would also hit e.g. "GROUP"; kept as-is since this parser is
/// diagnostic only). Subsequent `inet ` lines contribute the following
/// token, `/prefix` stripped, until the next header. `inet6` lines do not
/// match.
pub fn parse_interface_listing(text: &str) -> Vec<ParsedInterface> {
    let header = Regex::new(r"^\d+:\s+\w+:").unwrap();

    let mut interfaces: Vec<ParsedInterface> = Vec::new();
    let mut current: Option<ParsedInterface> = None;

    for line in text.lines() {
        if header.is_match(line) {
            if let Some(interface) = current.take() {
                interfaces.push(interface);
            }

            let name = line
                .split_whitespace()
                .nth(1)
                .map(|token| token.trim_end_matches(':').to_string())
                .unwrap_or_default();
            current = Some(ParsedInterface {
                name,
                up: line.contains("UP"),
                ips: Vec::new(),
            });
            continue;
        }

        if let (Some(interface), Some(idx)) = (current.as_mut(), line.find("inet ")) {
            if let Some(token) = line[idx + "inet ".len()..].split_whitespace().next() {
                let ip = token.split('/').next().unwrap_or(token);
                interface.ips.push(ip.to_string());
            }
        }
    }

    if let Some(interface) = current.take() {
        interfaces.push(interface);
    }

    interfaces
}

/// Counts interfaces that are up and interfaces carrying at least one
/// address, excluding the loopback interface.
pub fn summarize_interfaces(interfaces: &[ParsedInterface]) -> InterfaceSummary {
    let mut up_count = 0;
    let mut with_ip_count = 0;

    for interface in interfaces.iter().filter(|i| i.name != LOOPBACK_INTERFACE) {
        if interface.up {
            up_count += 1;
        }
        if !interface.ips.is_empty() {
            with_ip_count += 1;
        }
    }

    InterfaceSummary { up_count, with_ip_count }
}

/// Best-effort interface diagnostic: parses the listing, logs every record
/// and warns when fewer than 2 non-loopback interfaces are up or addressed.
/// Never fails, on purpose: interface dumps come from remote shells and are
/// too noisy to gate a validation on. The hard check lives in
/// `network::dual_homing`.
pub fn inspect_interface_listing(node_name: &str, text: &str) -> InterfaceSummary {
    let interfaces = parse_interface_listing(text);

    for interface in &interfaces {
        info!(
            "Node {}: interface {} up={} ips={:?}",
            node_name, interface.name, interface.up, interface.ips
        );
    }

    let summary = summarize_interfaces(&interfaces);
    if summary.up_count < 2 {
        warn!(
            "Node {} has only {} non-loopback interface(s) up, expected 2",
            node_name, summary.up_count
        );
    }
    if summary.with_ip_count < 2 {
        warn!(
            "Node {} has only {} non-loopback interface(s) with an assigned address, expected 2",
            node_name, summary.with_ip_count
        );
    }

    summary
}

/// Runs an interface-listing command (`ip a` locally, or over an ssh
/// session) and inspects its output. Command failures are logged and yield
/// `None`; this path never propagates an error.
pub fn inspect_interfaces_via_command<P>(
    node_name: &str,
    binary: P,
    args: &[&str],
    envs: &[(&str, &str)],
) -> Option<InterfaceSummary>
where
    P: AsRef<Path>,
{
    let mut output_vec: Vec<String> = Vec::new();
    let mut cmd = NetcheckCommand::new(&binary, args, envs);
    if let Err(err) = cmd.exec_with_output(&mut |line| output_vec.push(line), &mut |line| warn!("{}", line)) {
        warn!(
            "Cannot list interfaces on node {} with `{}`: {}",
            node_name,
            command_to_string(&binary, args, envs),
            err
        );
        return None;
    }

    Some(inspect_interface_listing(node_name, &output_vec.join("\n")))
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use crate::network::interfaces::{
        ParsedInterface, inspect_interface_listing, inspect_interfaces_via_command, parse_interface_listing,
        summarize_interfaces,
    };

    const IP_A_OUTPUT: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN group default qlen 1000
    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
    inet 127.0.0.1/8 scope host lo
       valid_lft forever preferred_lft forever
    inet6 ::1/128 scope host
       valid_lft forever preferred_lft forever
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP group default qlen 1000
    link/ether 00:50:56:aa:bb:cc brd ff:ff:ff:ff:ff:ff
    inet 10.0.0.1/24 brd 10.0.0.255 scope global eth0
       valid_lft forever preferred_lft forever
    inet6 fe80::250:56ff:feaa:bbcc/64 scope link
       valid_lft forever preferred_lft forever
3: eth1: <BROADCAST,MULTICAST> mtu 1500 qdisc mq state DOWN group default qlen 1000
    link/ether 00:50:56:aa:bb:cd brd ff:ff:ff:ff:ff:ff
    inet 10.0.1.1/24 brd 10.0.1.255 scope global eth1
       valid_lft forever preferred_lft forever
";

    #[test]
    fn test_parse_interface_listing() {
        let interfaces = parse_interface_listing(IP_A_OUTPUT);

        assert_eq!(
            interfaces,
            vec![
                ParsedInterface {
                    name: "lo".to_string(),
                    up: true,
                    ips: vec!["127.0.0.1".to_string()],
                },
                ParsedInterface {
                    name: "eth0".to_string(),
                    up: true,
                    ips: vec!["10.0.0.1".to_string()],
                },
                ParsedInterface {
                    name: "eth1".to_string(),
                    up: false,
                    ips: vec!["10.0.1.1".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_parse_flushes_last_record_without_trailing_header() {
        let interfaces = parse_interface_listing("2: eth0: <UP> mtu 1500\n    inet 192.168.0.10/16 scope global");

        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].name, "eth0");
        assert_eq!(interfaces[0].up, true);
        assert_eq!(interfaces[0].ips, vec!["192.168.0.10".to_string()]);
    }

    #[test]
    fn test_parse_ignores_inet6_and_free_text() {
        let interfaces = parse_interface_listing(
            "not an interface header\n2: eth0: <UP> mtu 1500\n    inet6 fe80::1/64 scope link\n",
        );

        assert_eq!(interfaces.len(), 1);
        assert!(interfaces[0].ips.is_empty());
    }

    #[test]
    fn test_parse_is_pure() {
        assert_eq!(parse_interface_listing(IP_A_OUTPUT), parse_interface_listing(IP_A_OUTPUT));
    }

    #[test]
    fn test_summary_excludes_loopback() {
        let interfaces = parse_interface_listing(IP_A_OUTPUT);
        let summary = summarize_interfaces(&interfaces);

        // lo is up and has an ip but must not count
        assert_eq!(summary.up_count, 1);
        assert_eq!(summary.with_ip_count, 2);
    }

    #[traced_test]
    #[test]
    fn test_inspect_warns_but_never_fails() {
        let summary = inspect_interface_listing("n1", IP_A_OUTPUT);

        assert_eq!(summary.up_count, 1);
        assert!(logs_contain("has only 1 non-loopback interface(s) up"));
    }

    #[traced_test]
    #[test]
    fn test_inspect_via_command_swallows_failures() {
        let summary = inspect_interfaces_via_command("n1", "/does/not/exist/ip", &["a"], &[]);

        assert!(summary.is_none());
        assert!(logs_contain("Cannot list interfaces on node n1"));
    }

    #[test]
    fn test_inspect_via_command_parses_stdout() {
        let listing = "2: eth0: <UP> mtu 1500\n    inet 10.0.0.1/24 scope global\n3: eth1: <UP> mtu 1500\n    inet 10.0.0.2/24 scope global";
        let summary = inspect_interfaces_via_command("n1", "echo", &[listing], &[]);

        assert_eq!(summary.map(|s| (s.up_count, s.with_ip_count)), Some((2, 2)));
    }
}
