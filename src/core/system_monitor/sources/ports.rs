//! Listening TCP/UDP sockets.
//!
//! The owning process is privilege-dependent: without elevation it is
//! reported as `PermissionDenied` while the rest of each entry is kept.

use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::core::system_monitor::source::{SharedSource, TelemetrySource, Unsupported};
use crate::core::system_monitor::{Domain, PortEntry, Reading, UnavailableReason};
use crate::platform::{CapabilityProfile, OsFamily, Probe, Tool};

pub fn for_platform(os: OsFamily, probe: Probe) -> SharedSource<Vec<PortEntry>> {
    match os {
        OsFamily::Other => Arc::new(Unsupported::new(Domain::Ports)),
        os => Arc::new(PortsSource { os, runner: probe }),
    }
}

/// Runs a listing tool and returns its stdout.
pub trait ToolRunner: Send + Sync + 'static {
    fn run_tool<'a>(
        &'a self,
        caps: &'a CapabilityProfile,
        tool: Tool,
        args: &'a [&'a str],
    ) -> BoxFuture<'a, Result<String, UnavailableReason>>;
}

impl ToolRunner for Probe {
    fn run_tool<'a>(
        &'a self,
        caps: &'a CapabilityProfile,
        tool: Tool,
        args: &'a [&'a str],
    ) -> BoxFuture<'a, Result<String, UnavailableReason>> {
        Box::pin(self.run(caps, tool, args))
    }
}

/// One socket listing command and its parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Ss,
    NetstatLinux,
    Lsof,
    NetstatBsd,
    NetstatWindows,
}

impl Listing {
    fn tool(self) -> Tool {
        match self {
            Listing::Ss => Tool::Ss,
            Listing::Lsof => Tool::Lsof,
            Listing::NetstatLinux | Listing::NetstatBsd | Listing::NetstatWindows => Tool::Netstat,
        }
    }

    fn args(self, elevated: bool) -> &'static [&'static str] {
        match (self, elevated) {
            (Listing::Ss, true) => &["-tulnp"],
            (Listing::Ss, false) => &["-tuln"],
            (Listing::NetstatLinux, _) => &["-tuln"],
            (Listing::Lsof, _) => &["-i", "-P", "-n", "-sTCP:LISTEN"],
            (Listing::NetstatBsd, _) => &["-an"],
            // -b needs an elevated token
            (Listing::NetstatWindows, true) => &["-abn"],
            (Listing::NetstatWindows, false) => &["-an"],
        }
    }

    fn parse(self, output: &str, elevated: bool) -> Vec<PortEntry> {
        match self {
            Listing::Ss => parse_ss(output, elevated),
            Listing::NetstatLinux => parse_netstat_linux(output, elevated),
            Listing::Lsof => parse_lsof(output),
            Listing::NetstatBsd => parse_netstat_bsd(output, elevated),
            Listing::NetstatWindows => parse_netstat_windows(output, elevated),
        }
    }
}

/// Listings to try in order. The first one that runs is used.
fn listings(os: OsFamily, elevated: bool) -> &'static [Listing] {
    match os {
        OsFamily::Linux | OsFamily::Android => &[Listing::Ss, Listing::NetstatLinux],
        OsFamily::MacOs if elevated => &[Listing::Lsof, Listing::NetstatBsd],
        // Unelevated lsof only sees the caller's own sockets
        OsFamily::MacOs => &[Listing::NetstatBsd, Listing::Lsof],
        OsFamily::Windows => &[Listing::NetstatWindows],
        OsFamily::Other => &[],
    }
}

struct PortsSource<R> {
    os: OsFamily,
    runner: R,
}

impl<R: ToolRunner> PortsSource<R> {
    /// Name the owners lsof can see on rows from an unprivileged netstat.
    async fn attach_lsof_owners(&self, caps: &CapabilityProfile, entries: &mut [PortEntry]) {
        match self
            .runner
            .run_tool(caps, Tool::Lsof, Listing::Lsof.args(false))
            .await
        {
            Ok(out) => attach_owners(entries, &parse_lsof(&out)),
            Err(reason) => log::debug!("lsof unavailable ({}), owners stay unknown", reason),
        }
    }
}

impl<R: ToolRunner> TelemetrySource for PortsSource<R> {
    type Output = Vec<PortEntry>;

    fn domain(&self) -> Domain {
        Domain::Ports
    }

    fn read<'a>(&'a self, caps: &'a CapabilityProfile) -> BoxFuture<'a, Reading<Vec<PortEntry>>> {
        Box::pin(async move {
            let elevated = caps.is_elevated;
            let mut last_error = UnavailableReason::NotSupportedOnPlatform;

            for &listing in listings(self.os, elevated) {
                match self.runner.run_tool(caps, listing.tool(), listing.args(elevated)).await {
                    Ok(out) => {
                        let mut entries = listing.parse(&out, elevated);
                        if listing == Listing::NetstatBsd && !elevated {
                            self.attach_lsof_owners(caps, &mut entries).await;
                        }
                        return Reading::Available(finish(entries));
                    }
                    Err(reason) => {
                        log::debug!("{} unavailable ({})", listing.tool().binary(), reason);
                        last_error = reason;
                    }
                }
            }

            Reading::Unavailable(last_error)
        })
    }
}

/// `tcp4`, `tcp46` and `tcp6` all name the same transport.
fn transport(protocol: &str) -> &str {
    protocol.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Copy known owners onto entries with the same transport and port.
fn attach_owners(entries: &mut [PortEntry], owners: &[PortEntry]) {
    for entry in entries.iter_mut().filter(|e| !e.process.is_available()) {
        if let Some(owner) = owners
            .iter()
            .find(|o| o.port == entry.port && transport(&o.protocol) == transport(&entry.protocol))
        {
            entry.process = owner.process.clone();
        }
    }
}

/// Process field for a path that cannot name the owner.
fn process_unknown(elevated: bool) -> Reading<String> {
    if elevated {
        Reading::Unavailable(UnavailableReason::QueryFailed)
    } else {
        Reading::Unavailable(UnavailableReason::PermissionDenied)
    }
}

fn finish(mut entries: Vec<PortEntry>) -> Vec<PortEntry> {
    entries.sort_by(|a, b| {
        a.port
            .cmp(&b.port)
            .then_with(|| a.protocol.cmp(&b.protocol))
            .then_with(|| a.local_address.cmp(&b.local_address))
    });
    entries.dedup_by(|a, b| a.port == b.port && a.protocol == b.protocol && a.local_address == b.local_address);
    entries
}

/// Split `addr:port`, `[v6]:port` or the BSD `addr.port` form.
fn split_endpoint(raw: &str, separator: char) -> Option<(String, u16)> {
    let (addr, port) = raw.rsplit_once(separator)?;
    let port = port.parse::<u16>().ok()?;
    Some((addr.to_string(), port))
}

// ============================================================================
// Linux
// ============================================================================

/// Parse `ss -tuln` / `ss -tulnp`.
pub fn parse_ss(output: &str, elevated: bool) -> Vec<PortEntry> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("Netid"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 6 {
                return None;
            }
            let (local_address, port) = split_endpoint(cols[4], ':')?;

            let process = if elevated {
                Reading::from_option(
                    cols[6..].iter().find_map(|c| parse_ss_users(c)),
                    UnavailableReason::QueryFailed,
                )
            } else {
                Reading::Unavailable(UnavailableReason::PermissionDenied)
            };

            Some(PortEntry {
                protocol: cols[0].to_lowercase(),
                local_address,
                port,
                remote_address: cols[5].to_string(),
                state: cols[1].to_string(),
                process,
            })
        })
        .collect()
}

/// `users:(("sshd",pid=812,fd=3))` -> `sshd`
fn parse_ss_users(field: &str) -> Option<String> {
    let rest = field.strip_prefix("users:((\"")?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Parse Linux `netstat -tuln`.
pub fn parse_netstat_linux(output: &str, elevated: bool) -> Vec<PortEntry> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let protocol = cols.first()?.to_lowercase();
            if !protocol.starts_with("tcp") && !protocol.starts_with("udp") {
                return None;
            }
            if cols.len() < 5 {
                return None;
            }
            let (local_address, port) = split_endpoint(cols[3], ':')?;
            let state = cols.get(5).map(|s| s.to_string()).unwrap_or_else(|| "UNCONN".to_string());

            Some(PortEntry {
                protocol,
                local_address,
                port,
                remote_address: cols[4].to_string(),
                state,
                process: process_unknown(elevated),
            })
        })
        .collect()
}

// ============================================================================
// macOS
// ============================================================================

/// Parse `lsof -i -P -n -sTCP:LISTEN`.
///
/// lsof only lists sockets the caller may inspect, so the command name is
/// always known for the rows it returns.
pub fn parse_lsof(output: &str) -> Vec<PortEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 9 {
                return None;
            }
            let protocol = cols[7].to_lowercase();
            if protocol != "tcp" && protocol != "udp" {
                return None;
            }
            let name = cols[8];
            if name.contains("->") {
                return None;
            }
            let (local_address, port) = split_endpoint(name, ':')?;
            let state = cols
                .get(9)
                .map(|s| s.trim_matches(|c| c == '(' || c == ')').to_string())
                .unwrap_or_else(|| "UNCONN".to_string());

            Some(PortEntry {
                protocol: format!("{}{}", protocol, if cols[4] == "IPv6" { "6" } else { "" }),
                local_address,
                port,
                remote_address: "*".to_string(),
                state,
                process: Reading::Available(cols[0].replace("\\x20", " ")),
            })
        })
        .collect()
}

/// Parse BSD `netstat -an`, keeping listening TCP and all UDP sockets.
pub fn parse_netstat_bsd(output: &str, elevated: bool) -> Vec<PortEntry> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let protocol = cols.first()?.to_lowercase();
            let is_tcp = protocol.starts_with("tcp");
            if !is_tcp && !protocol.starts_with("udp") {
                return None;
            }
            if cols.len() < 5 {
                return None;
            }
            let state = cols.get(5).copied().unwrap_or("UNCONN");
            if is_tcp && state != "LISTEN" {
                return None;
            }
            let (local_address, port) = split_endpoint(cols[3], '.')?;

            Some(PortEntry {
                protocol,
                local_address,
                port,
                remote_address: cols[4].to_string(),
                state: state.to_string(),
                process: process_unknown(elevated),
            })
        })
        .collect()
}

// ============================================================================
// Windows
// ============================================================================

/// Parse Windows `netstat -an` / `netstat -abn`.
///
/// With `-b`, the owning executable follows its socket line as `[name.exe]`.
pub fn parse_netstat_windows(output: &str, elevated: bool) -> Vec<PortEntry> {
    let mut entries: Vec<PortEntry> = Vec::new();
    let mut last_listening = false;

    for line in output.lines() {
        let trimmed = line.trim();

        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if last_listening {
                if let Some(entry) = entries.last_mut() {
                    entry.process = Reading::Available(name.to_string());
                }
            }
            continue;
        }

        let cols: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(first) = cols.first() else { continue };
        let protocol = first.to_lowercase();
        if protocol != "tcp" && protocol != "udp" {
            // Service names and "Can not obtain ownership" notes
            continue;
        }

        last_listening = false;
        if cols.len() < 3 {
            continue;
        }
        let state = cols.get(3).copied().unwrap_or("UNCONN");
        if protocol == "tcp" && state != "LISTENING" {
            continue;
        }
        let Some((local_address, port)) = split_endpoint(cols[1], ':') else {
            continue;
        };

        entries.push(PortEntry {
            protocol,
            local_address,
            port,
            remote_address: cols[2].to_string(),
            state: state.to_string(),
            process: process_unknown(elevated),
        });
        last_listening = true;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const SS_ELEVATED: &str = "\
Netid State  Recv-Q Send-Q Local Address:Port  Peer Address:Port Process
udp   UNCONN 0      0      127.0.0.53%lo:53    0.0.0.0:*          users:((\"systemd-resolve\",pid=640,fd=13))
tcp   LISTEN 0      4096   0.0.0.0:22          0.0.0.0:*          users:((\"sshd\",pid=812,fd=3))
tcp   LISTEN 0      128    [::]:8080           [::]:*
";

    const SS_PLAIN: &str = "\
Netid State  Recv-Q Send-Q Local Address:Port  Peer Address:Port Process
udp   UNCONN 0      0      127.0.0.53%lo:53    0.0.0.0:*
tcp   LISTEN 0      4096   0.0.0.0:22          0.0.0.0:*
";

    #[test]
    fn test_parse_ss_elevated() {
        let entries = parse_ss(SS_ELEVATED, true);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].port, 22);
        assert_eq!(entries[1].local_address, "0.0.0.0");
        assert_eq!(entries[1].process, Reading::Available("sshd".to_string()));
        assert_eq!(entries[2].local_address, "[::]");
        assert_eq!(entries[2].process, Reading::Unavailable(UnavailableReason::QueryFailed));
    }

    #[test]
    fn test_unprivileged_ports_keep_entries_without_process() {
        let entries = finish(parse_ss(SS_PLAIN, false));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].port, 22);
        assert_eq!(entries[0].state, "LISTEN");
        for entry in &entries {
            assert_eq!(entry.process, Reading::Unavailable(UnavailableReason::PermissionDenied));
        }
    }

    #[test]
    fn test_parse_netstat_linux() {
        let out = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN
tcp6       0      0 :::80                   :::*                    LISTEN
udp        0      0 0.0.0.0:68              0.0.0.0:*
";
        let entries = parse_netstat_linux(out, false);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].local_address, "::");
        assert_eq!(entries[1].port, 80);
        assert_eq!(entries[2].state, "UNCONN");
    }

    #[test]
    fn test_parse_lsof() {
        let out = "\
COMMAND   PID USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
rapportd  512 me     4u   IPv4 0x1234567890abcdef      0t0  TCP *:49152 (LISTEN)
Code\\x20H 900 me    40u   IPv6 0x1234567890abcdee      0t0  TCP [::1]:3000 (LISTEN)
";
        let entries = parse_lsof(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].protocol, "tcp");
        assert_eq!(entries[0].port, 49152);
        assert_eq!(entries[0].state, "LISTEN");
        assert_eq!(entries[0].process, Reading::Available("rapportd".to_string()));
        assert_eq!(entries[1].protocol, "tcp6");
        assert_eq!(entries[1].process, Reading::Available("Code H".to_string()));
    }

    #[test]
    fn test_parse_netstat_bsd() {
        let out = "\
Active Internet connections (including servers)
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
tcp4       0      0  *.22                   *.*                    LISTEN
tcp4       0      0  192.168.0.10.55000     17.57.146.20.5223      ESTABLISHED
udp4       0      0  *.5353                 *.*
";
        let entries = parse_netstat_bsd(out, false);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local_address, "*");
        assert_eq!(entries[0].port, 22);
        assert_eq!(entries[1].port, 5353);
    }

    #[test]
    fn test_parse_netstat_windows_with_owner() {
        let out = "\
Active Connections

  Proto  Local Address          Foreign Address        State
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING
  RpcSs
 [svchost.exe]
  TCP    192.168.1.5:50000      20.1.1.1:443           ESTABLISHED
 [chrome.exe]
  UDP    0.0.0.0:5353           *:*
 [chrome.exe]
";
        let entries = parse_netstat_windows(out, true);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].port, 135);
        assert_eq!(entries[0].process, Reading::Available("svchost.exe".to_string()));
        assert_eq!(entries[1].protocol, "udp");
        assert_eq!(entries[1].process, Reading::Available("chrome.exe".to_string()));
    }

    #[test]
    fn test_parse_netstat_windows_unprivileged() {
        let out = "  TCP    0.0.0.0:445            0.0.0.0:0              LISTENING\n";
        let entries = parse_netstat_windows(out, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].process, Reading::Unavailable(UnavailableReason::PermissionDenied));
    }
    /// Canned stdout per tool, recording every invocation.
    struct FakeTools {
        outputs: Vec<(Tool, &'static str)>,
        calls: parking_lot::Mutex<Vec<(Tool, Vec<String>)>>,
    }

    impl FakeTools {
        fn new(outputs: Vec<(Tool, &'static str)>) -> Self {
            Self {
                outputs,
                calls: parking_lot::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(Tool, Vec<String>)> {
            self.calls.lock().clone()
        }
    }

    impl ToolRunner for FakeTools {
        fn run_tool<'a>(
            &'a self,
            _caps: &'a CapabilityProfile,
            tool: Tool,
            args: &'a [&'a str],
        ) -> BoxFuture<'a, Result<String, UnavailableReason>> {
            self.calls
                .lock()
                .push((tool, args.iter().map(|a| a.to_string()).collect()));
            let result = self
                .outputs
                .iter()
                .find(|(t, _)| *t == tool)
                .map(|(_, out)| out.to_string())
                .ok_or(UnavailableReason::ToolMissing);
            Box::pin(async move { result })
        }
    }

    fn ports(os: OsFamily, outputs: Vec<(Tool, &'static str)>) -> PortsSource<FakeTools> {
        PortsSource {
            os,
            runner: FakeTools::new(outputs),
        }
    }

    async fn read_as(source: &PortsSource<FakeTools>, elevated: bool) -> Reading<Vec<PortEntry>> {
        source.read(&CapabilityProfile::new(source.os, elevated, [])).await
    }

    const BSD_NETSTAT: &str = "\
Active Internet connections (including servers)
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
tcp4       0      0  *.22                   *.*                    LISTEN
tcp46      0      0  *.3000                 *.*                    LISTEN
udp4       0      0  *.5353                 *.*
";

    const OWN_LSOF: &str = "\
COMMAND   PID USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
node      900 me     22u  IPv6 0x1234567890abcdee      0t0  TCP *:3000 (LISTEN)
";

    #[tokio::test]
    async fn test_unelevated_linux_read_omits_process_flag() {
        let source = ports(OsFamily::Linux, vec![(Tool::Ss, SS_PLAIN)]);
        let entries = read_as(&source, false).await.into_value().unwrap();

        assert_eq!(source.runner.calls(), vec![(Tool::Ss, vec!["-tuln".to_string()])]);
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.process == Reading::Unavailable(UnavailableReason::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_elevated_linux_read_asks_for_processes() {
        let source = ports(OsFamily::Linux, vec![(Tool::Ss, SS_ELEVATED)]);
        let entries = read_as(&source, true).await.into_value().unwrap();

        assert_eq!(source.runner.calls(), vec![(Tool::Ss, vec!["-tulnp".to_string()])]);
        assert!(entries.iter().any(|e| e.process == Reading::Available("sshd".to_string())));
    }

    #[tokio::test]
    async fn test_linux_read_falls_back_to_netstat() {
        let source = ports(OsFamily::Linux, vec![(
            Tool::Netstat,
            "tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN\n",
        )]);
        let entries = read_as(&source, false).await.into_value().unwrap();

        assert_eq!(source.runner.calls().len(), 2);
        assert_eq!(source.runner.calls()[1], (Tool::Netstat, vec!["-tuln".to_string()]));
        assert_eq!(entries[0].port, 22);
    }

    #[tokio::test]
    async fn test_unelevated_windows_read_skips_owner_flag() {
        let source = ports(OsFamily::Windows, vec![(
            Tool::Netstat,
            "  TCP    0.0.0.0:445            0.0.0.0:0              LISTENING\n",
        )]);
        let entries = read_as(&source, false).await.into_value().unwrap();

        assert_eq!(source.runner.calls(), vec![(Tool::Netstat, vec!["-an".to_string()])]);
        assert_eq!(entries[0].process, Reading::Unavailable(UnavailableReason::PermissionDenied));
    }

    #[tokio::test]
    async fn test_elevated_windows_read_asks_for_owners() {
        let source = ports(OsFamily::Windows, vec![(Tool::Netstat, "")]);
        let _ = read_as(&source, true).await;
        assert_eq!(source.runner.calls(), vec![(Tool::Netstat, vec!["-abn".to_string()])]);
    }

    #[tokio::test]
    async fn test_unelevated_mac_lists_every_socket_and_names_own_ones() {
        let source = ports(OsFamily::MacOs, vec![(Tool::Netstat, BSD_NETSTAT), (Tool::Lsof, OWN_LSOF)]);
        let entries = read_as(&source, false).await.into_value().unwrap();

        let called: Vec<Tool> = source.runner.calls().into_iter().map(|(tool, _)| tool).collect();
        assert_eq!(called, vec![Tool::Netstat, Tool::Lsof]);

        assert_eq!(entries.len(), 3);
        let by_port = |port: u16| entries.iter().find(|e| e.port == port).unwrap();
        assert_eq!(by_port(3000).process, Reading::Available("node".to_string()));
        assert_eq!(
            by_port(22).process,
            Reading::Unavailable(UnavailableReason::PermissionDenied)
        );
        assert_eq!(
            by_port(5353).process,
            Reading::Unavailable(UnavailableReason::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_unelevated_mac_without_lsof_keeps_netstat_rows() {
        let source = ports(OsFamily::MacOs, vec![(Tool::Netstat, BSD_NETSTAT)]);
        let entries = read_as(&source, false).await.into_value().unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_elevated_mac_prefers_lsof() {
        let source = ports(OsFamily::MacOs, vec![(Tool::Netstat, BSD_NETSTAT), (Tool::Lsof, OWN_LSOF)]);
        let entries = read_as(&source, true).await.into_value().unwrap();

        assert_eq!(source.runner.calls().len(), 1);
        assert_eq!(source.runner.calls()[0].0, Tool::Lsof);
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_no_listing_tool_reports_the_last_failure() {
        let source = ports(OsFamily::Linux, vec![]);
        let reading = read_as(&source, false).await;
        assert_eq!(reading, Reading::Unavailable(UnavailableReason::ToolMissing));
    }
}
