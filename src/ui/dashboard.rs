//! Text rendering of one snapshot and its warnings.
//!
//! Pure: the same snapshot, warnings and options always give the same text.

use crate::core::system_monitor::{
    Domain, GpuReading, InterfaceAddress, Reading, SensorsReading, Snapshot, Warning,
};

use super::formatters::{
    format_freq, format_gb, format_size, format_time, format_uptime, load_bar, or_na, or_reason, NOT_AVAILABLE,
};
use super::table::{center, center_pad, paint, paint_bold, Table, BABY_PINK, HOT_PINK, RAINBOW};

const BANNER: &str = "System dashboard for macOS, Linux, Windows and Android via Termux";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Terminal width in columns
    pub width: usize,
    /// Emit ANSI colors
    pub color: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { width: 80, color: true }
    }
}

/// Render the whole dashboard.
pub fn render(snapshot: &Snapshot, warnings: &[Warning], options: &RenderOptions) -> String {
    let mut out = Vec::new();
    let width = options.width;
    let color = options.color;

    let rule = "=".repeat(width);
    out.push(paint(&rule, BABY_PINK, color));
    out.push(paint_bold(&center(BANNER, width), RAINBOW[1], color));
    out.push(paint(&rule, BABY_PINK, color));
    out.push(format!("Last update: {}\n", format_time(&snapshot.taken_at)));

    let sections: [(Vec<Table>, Option<Domain>); 7] = [
        (vec![system_table(snapshot)], None),
        (vec![network_table(snapshot)], Some(Domain::Network)),
        (vec![ports_table(snapshot)], None),
        (vec![resource_table(snapshot)], Some(Domain::Memory)),
        (vec![cpu_table(snapshot)], Some(Domain::Cpu)),
        (gpu_table(snapshot).into_iter().collect(), Some(Domain::Gpu)),
        (vec![disk_table(snapshot), disk_temperature_table(snapshot)], Some(Domain::Disks)),
    ];

    for (tables, domain) in sections {
        if tables.is_empty() && domain.map_or(true, |d| !warnings.iter().any(|w| w.domain == d)) {
            continue;
        }
        for table in &tables {
            out.push(table.render(width, color));
        }
        if let Some(domain) = domain {
            for warning in warnings.iter().filter(|w| w.domain == domain) {
                out.push(warning_line(warning, width, color));
            }
        }
        out.push(String::new());
    }

    out.push(browsers_table(snapshot).render(width, color));
    out.push(String::new());

    out.join("\n")
}

fn warning_line(warning: &Warning, width: usize, color: bool) -> String {
    let text = format!("⚠️  {}", warning.message);
    let pad = center_pad(width, unicode_width::UnicodeWidthStr::width(text.as_str()));
    format!("{}{}", pad, paint_bold(&text, HOT_PINK, color))
}

fn info_table(title: &str, message: &str) -> Table {
    let mut table = Table::new(title, &["Info"]);
    table.row([message]);
    table
}

fn system_table(snapshot: &Snapshot) -> Table {
    let mut table = Table::new("SYSTEM INFORMATION", &["Component", "Details"]).rainbow_from(3);

    match &snapshot.system {
        Reading::Available(system) => {
            let os = match system.os_version.value() {
                Some(version) => format!("{} {}", system.os_name, version),
                None => system.os_name.clone(),
            };
            table.row(["OS".to_string(), os]);
            table.row(["Kernel".to_string(), or_na(&system.kernel, String::clone)]);
            table.row(["Hostname".to_string(), or_na(&system.hostname, String::clone)]);
            table.row(["Uptime".to_string(), format_uptime(system.uptime_secs)]);
        }
        Reading::Unavailable(reason) => table.row(["OS".to_string(), format!("{} ({})", NOT_AVAILABLE, reason)]),
    }

    table.row(["CPU".to_string(), or_na(&snapshot.cpu, |cpu| cpu.brand.clone())]);
    table.row([
        "GPU".to_string(),
        or_na(&snapshot.gpu, |gpus| {
            let names: Vec<String> = gpus.iter().filter_map(|g| g.name.value().cloned()).collect();
            if names.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                names.join(", ")
            }
        }),
    ]);

    let model = snapshot.system.as_ref().and_then(|s| s.system_model.as_ref()).map(|m| m.clone());
    table.row(["System".to_string(), or_na(&model, String::clone)]);

    let peripherals = snapshot.peripherals.as_ref();
    let npu = peripherals.clone().and_then(|p| p.npu.as_ref()).map(|n| n.clone());
    table.row(["NPU".to_string(), or_na(&npu, String::clone).replace(NOT_AVAILABLE, "Not detected")]);

    let cache = snapshot.cpu.as_ref().and_then(|c| c.cache.as_ref()).map(|levels| {
        levels
            .iter()
            .map(|l| format!("{}: {}K", l.label(), l.size_kb))
            .collect::<Vec<_>>()
            .join(", ")
    });
    table.row(["Cache".to_string(), or_na(&cache, String::clone)]);
    table.row([
        "Total Cache (KB)".to_string(),
        or_na(&snapshot.derived.total_cache_kb, |kb| format!("{} KB", kb)),
    ]);

    let audio = peripherals.clone().and_then(|p| p.audio_device.as_ref()).map(|a| a.clone());
    table.row(["Audio".to_string(), or_na(&audio, String::clone)]);

    match peripherals.and_then(|p| p.monitors.as_ref()) {
        Reading::Available(monitors) if !monitors.is_empty() => {
            for (i, monitor) in monitors.iter().enumerate() {
                let mut line = monitor.name.clone();
                if let Some(res) = monitor.resolution.value() {
                    line.push_str(&format!(" {}", res));
                }
                if let Some(hz) = monitor.refresh_hz.value() {
                    line.push_str(&format!(" @ {:.0}Hz", hz));
                }
                let label = if i == 0 { "Monitor" } else { "" };
                table.row([label.to_string(), line]);
            }
        }
        _ => table.row(["Monitor", NOT_AVAILABLE]),
    }

    table
}

fn network_table(snapshot: &Snapshot) -> Table {
    let mut table = Table::new("NETWORK", &["Item", "Details"]).rainbow_from(5);

    let Reading::Available(network) = &snapshot.network else {
        table.row(["Internet", "Disconnected"]);
        return table;
    };

    let internet = match network.connected {
        Reading::Available(true) => "Connected".to_string(),
        Reading::Available(false) => "Disconnected".to_string(),
        Reading::Unavailable(reason) => format!("Unknown ({})", reason),
    };
    table.row(["Internet".to_string(), internet]);

    let join = |addrs: &[InterfaceAddress]| {
        if addrs.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            addrs
                .iter()
                .map(|a| format!("{} ({})", a.address, a.interface))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    table.row(["Private IPv4".to_string(), join(network.private_ipv4.as_slice())]);
    table.row(["Private IPv6".to_string(), join(network.private_ipv6.as_slice())]);
    table.row(["Public IPv4".to_string(), or_na(&network.public_ipv4, String::clone)]);
    table.row(["Public IPv6".to_string(), or_na(&network.public_ipv6, String::clone)]);
    table.row(["MAC Address (active)".to_string(), or_na(&network.active_mac, String::clone)]);
    table
}

fn ports_table(snapshot: &Snapshot) -> Table {
    match &snapshot.ports {
        Reading::Available(ports) if !ports.is_empty() => {
            let mut table = Table::new(
                "LISTENING PORTS",
                &["Proto", "Local Address", "Remote Address", "State", "Process"],
            );
            for port in ports {
                table.row([
                    port.protocol.clone(),
                    format!("{}:{}", port.local_address, port.port),
                    port.remote_address.clone(),
                    port.state.clone(),
                    or_reason(&port.process, String::clone),
                ]);
            }
            table
        }
        _ => info_table("LISTENING PORTS", "No listening ports found or unable to query"),
    }
}

fn cpu_temperature(sensors: &Reading<SensorsReading>) -> String {
    or_na(&sensors.as_ref().and_then(|s| s.cpu_temperatures.as_ref()), |temps| {
        if temps.is_empty() {
            return NOT_AVAILABLE.to_string();
        }
        temps
            .iter()
            .map(|t| format!("{}: {:.1}°C", t.label, t.celsius))
            .collect::<Vec<_>>()
            .join(", ")
    })
}

fn fan_speed(sensors: &Reading<SensorsReading>) -> String {
    or_na(&sensors.as_ref().and_then(|s| s.fans.as_ref()), |fans| {
        if fans.is_empty() {
            return NOT_AVAILABLE.to_string();
        }
        fans.iter()
            .map(|f| format!("{}: {} RPM", f.label, f.rpm))
            .collect::<Vec<_>>()
            .join(", ")
    })
}

fn gpu_temperature(gpus: &Reading<Vec<GpuReading>>) -> String {
    or_na(gpus, |gpus| {
        let temps: Vec<String> = gpus
            .iter()
            .filter_map(|g| g.temperature_celsius.value().map(|t| format!("GPU{}: {:.0}°C", g.index, t)))
            .collect();
        if temps.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            temps.join(", ")
        }
    })
}

fn resource_table(snapshot: &Snapshot) -> Table {
    let mut table = Table::new("RESOURCE USAGE", &["Metric", "Value"]).rainbow_from(1);

    match &snapshot.memory {
        Reading::Available(mem) => {
            table.row(["Memory Total".to_string(), format_gb(mem.total_kb)]);
            table.row([
                "Memory Used".to_string(),
                format!("{} ({:.1}%)", format_gb(mem.used_kb), mem.used_percent),
            ]);
            table.row(["Memory Free".to_string(), format_gb(mem.free_kb)]);
            table.row(["Memory Avail".to_string(), format_size(mem.available_kb)]);
        }
        Reading::Unavailable(reason) => {
            table.row(["Memory".to_string(), format!("{} ({})", NOT_AVAILABLE, reason)]);
        }
    }

    table.row(["CPU Temp".to_string(), cpu_temperature(&snapshot.sensors)]);
    table.row(["Fan Speed".to_string(), fan_speed(&snapshot.sensors)]);
    table.row(["GPU Temp".to_string(), gpu_temperature(&snapshot.gpu)]);

    if let Reading::Available(batteries) = &snapshot.battery {
        for battery in batteries {
            table.row(["Battery".to_string(), format!("{:.1}%", battery.percent)]);
            table.row(["Status".to_string(), battery.status.to_string()]);
            table.row(["Cycles".to_string(), or_na(&battery.cycle_count, |c| c.to_string())]);
        }
    }

    table
}

fn cpu_table(snapshot: &Snapshot) -> Table {
    let Reading::Available(cpu) = &snapshot.cpu else {
        return info_table("CPU PER CORE", "CPU usage unavailable");
    };

    let mut table = Table::new("CPU PER CORE", &["Core", "Usage", "Load Bar", "Frequency"]).rainbow_from(3);
    for core in &cpu.cores {
        table.row([
            format!("Core {}", core.index),
            format!("{:5.1}%", core.usage_percent),
            load_bar(core.usage_percent),
            or_na(&core.frequency_mhz, |mhz| format_freq(*mhz)),
        ]);
    }
    table
}

fn gpu_table(snapshot: &Snapshot) -> Option<Table> {
    let gpus = snapshot.gpu.value()?;
    if !gpus.iter().any(|g| g.utilization_percent.is_available()) {
        return None;
    }

    let mut table = Table::new("GPU UTILIZATION", &["GPU", "Name", "Usage", "Load Bar"]).rainbow_from(2);
    for gpu in gpus {
        table.row([
            format!("GPU{}", gpu.index),
            or_na(&gpu.name, String::clone),
            or_na(&gpu.utilization_percent, |u| format!("{:.0}%", u)),
            or_na(&gpu.utilization_percent, |u| load_bar(*u)),
        ]);
    }
    Some(table)
}

fn disk_table(snapshot: &Snapshot) -> Table {
    let Some(report) = snapshot.disks.value().filter(|r| !r.volumes.is_empty()) else {
        return info_table("DISK USAGE", "No physical partitions found");
    };

    let mut table = Table::new(
        "DISK USAGE",
        &["Device", "Mount", "FS Type", "Drive", "Total", "Used", "Free", "Used%"],
    )
    .rainbow_from(1);
    for volume in &report.volumes {
        table.row([
            volume.device.clone(),
            volume.mount_point.clone(),
            volume.filesystem_type.to_uppercase(),
            or_na(&volume.drive_kind, |k| format!("{:?}", k).to_uppercase()).replace(NOT_AVAILABLE, "unknown"),
            format_gb(volume.total_kb),
            format_gb(volume.used_kb),
            format_gb(volume.free_kb),
            format!("{:.1}%", volume.used_percent),
        ]);
    }
    table
}

fn disk_temperature_table(snapshot: &Snapshot) -> Table {
    let temps = snapshot.disks.as_ref().and_then(|r| r.temperatures.as_ref());
    match temps {
        Reading::Available(temps) if !temps.is_empty() => {
            let mut table = Table::new("DISK TEMPERATURES", &["Device", "Temperature"]).rainbow_from(4);
            for t in temps {
                table.row([t.device.clone(), format!("{}°C", t.celsius)]);
            }
            table
        }
        Reading::Unavailable(reason) => {
            info_table("DISK TEMPERATURES", &format!("No temperature data available ({})", reason))
        }
        _ => info_table("DISK TEMPERATURES", "No temperature data available"),
    }
}

fn browsers_table(snapshot: &Snapshot) -> Table {
    match &snapshot.browsers {
        Reading::Available(browsers) if !browsers.is_empty() => {
            let mut table = Table::new("INSTALLED BROWSERS", &["Browser", "Version", "Install Path"]).rainbow_from(2);
            for browser in browsers {
                table.row([
                    browser.name.clone(),
                    or_na(&browser.version, String::clone),
                    browser.install_path.clone(),
                ]);
            }
            table
        }
        _ => info_table("INSTALLED BROWSERS", "None detected"),
    }
}
