//! Output formatting utilities
//!
//! Provides table, compact and JSON output formatting for CLI commands.
//! Any field that could not be read renders as `N/A`.

use crate::cli::args::OutputFormat;
use crate::domain::{DeviceSnapshot, GpuInfo, ManagerInfo, Tunable, TunableReading};
use crate::error::{ConfigError, Result};
use serde::Serialize;
use std::fmt::Display;
use std::io::{self, Write};

const NA: &str = "N/A";

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_output(&mut handle, data, format)
}

/// Format `data` and write it to `out`
pub fn write_output<W: Write, T: Serialize + TableDisplay>(
    out: &mut W,
    data: &T,
    format: OutputFormat,
) -> Result<()> {
    let rendered = match format {
        OutputFormat::Table => data.to_table(),
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(ConfigError::from)?,
        OutputFormat::Compact => data.to_compact(),
    };

    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NA.to_string(), |v| v.to_string())
}

/// GPU list entry for display
#[derive(Debug, Clone, Serialize)]
pub struct GpuListEntry {
    pub index: u32,
    pub name: String,
    pub uuid: String,
}

impl From<&GpuInfo> for GpuListEntry {
    fn from(info: &GpuInfo) -> Self {
        Self {
            index: info.index,
            name: info.name.clone(),
            uuid: info.uuid.clone(),
        }
    }
}

impl TableDisplay for GpuListEntry {
    fn to_table(&self) -> String {
        format!("[{}] {} (UUID: {})", self.index, self.name, self.uuid)
    }

    fn to_compact(&self) -> String {
        format!("{}:{}", self.index, self.name)
    }
}

/// GPU list for display
#[derive(Debug, Clone, Serialize)]
pub struct GpuList {
    #[serde(flatten)]
    pub manager: ManagerInfo,
    pub gpus: Vec<GpuListEntry>,
}

impl TableDisplay for GpuList {
    fn to_table(&self) -> String {
        let mut output = self.manager.to_table();
        output.push_str(&format!("\nGPUs Found: {}\n\n", self.gpus.len()));

        for gpu in &self.gpus {
            output.push_str(&gpu.to_table());
            output.push('\n');
        }

        output
    }

    fn to_compact(&self) -> String {
        self.gpus
            .iter()
            .map(|g| g.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TableDisplay for ManagerInfo {
    fn to_table(&self) -> String {
        format!(
            "{} {} | Driver {} | CUDA {}",
            self.name, self.version, self.driver_version, self.cuda_version
        )
    }
}

fn tunable_value(tunable: Tunable, reading: &TunableReading) -> String {
    let approx = if reading.approximate { "~" } else { "" };
    or_na(reading.value.map(|v| format!("{}{}", approx, tunable.format_value(v))))
}

fn tunable_range(tunable: Tunable, reading: &TunableReading) -> String {
    match reading.range {
        Some(range) => {
            let (min, max) = (
                tunable.to_user_units(range.min),
                tunable.to_user_units(range.max),
            );
            let approx = if range.approximate { "~" } else { "" };
            format!("{}{} to {} {}", approx, min, max, tunable.unit())
        }
        None => NA.to_string(),
    }
}

impl TableDisplay for DeviceSnapshot {
    fn to_table(&self) -> String {
        let mut out = format!("{}\n  UUID:          {}\n", self.gpu, self.gpu.uuid);

        out.push_str(&format!(
            "  Utilization:   {}\n",
            or_na(
                self.utilization
                    .map(|u| format!("GPU {}%, Memory {}%", u.gpu, u.memory))
            )
        ));
        out.push_str(&format!(
            "  Clocks:        Graphics {}, Memory {}\n",
            or_na(self.clocks.map(|c| c.graphics)),
            or_na(self.clocks.and_then(|c| c.memory))
        ));
        out.push_str(&format!("  Temperature:   {}\n", or_na(self.temperature)));
        out.push_str(&format!("  Fan:           {}\n", or_na(self.fan)));
        let vram = self.memory.map(|m| {
            format!("{} / {} MB ({}%)", m.used_mb(), m.total_mb(), m.usage_percent())
        });
        out.push_str(&format!("  VRAM:          {}\n", or_na(vram)));
        out.push_str(&format!("  Power Draw:    {}\n", or_na(self.power_draw)));

        if let Some(reasons) = self.throttle_reasons.filter(|r| r.is_throttling()) {
            out.push_str(&format!(
                "  Throttling:    {}\n",
                reasons.active_reasons().join(", ")
            ));
        }

        out.push_str("\n  Tunable               Current         Range\n");
        out.push_str("  ───────────────────────────────────────────────────────\n");
        for tunable in Tunable::ALL {
            let reading = self.tunable(tunable);
            let mut current = tunable_value(tunable, reading);
            if tunable == Tunable::PowerLimit && !self.power_settable {
                current.push_str(" (locked)");
            }
            if tunable == Tunable::CoreClockLock && self.explicit_lock.is_none() {
                current.push_str(" (unlocked)");
            }
            out.push_str(&format!(
                "  {:<21} {:<15} {}\n",
                tunable.label(),
                current,
                tunable_range(tunable, reading)
            ));
        }

        out
    }

    /// `idx[util clock temp][mem-util mem-clock used/total][fan rpm][draw/limit|(min,max)][offset|(min,max)]`
    fn to_compact(&self) -> String {
        let gb = |bytes: u64| format!("{:.1}G", bytes as f64 / 1024.0 / 1024.0 / 1024.0);
        let watts = |mw: i64| format!("{}W", mw / 1000);
        let signed = |mhz: i64| format!("{:+}", mhz);

        let pl = &self.power_limit;
        let co = &self.core_offset;

        format!(
            "{}[{}% {}MHz {}][{}% {}MHz {}/{}][{}% {}RPM][{}/{}|({},{})][{}MHz|({},{})]",
            self.gpu.index,
            or_na(self.utilization.map(|u| u.gpu)),
            or_na(self.clocks.map(|c| c.graphics.as_mhz())),
            or_na(self.temperature),
            or_na(self.utilization.map(|u| u.memory)),
            or_na(self.clocks.and_then(|c| c.memory).map(|c| c.as_mhz())),
            or_na(self.memory.map(|m| gb(m.used))),
            or_na(self.memory.map(|m| gb(m.total))),
            or_na(self.fan.map(|f| f.percent)),
            or_na(self.fan.map(|f| f.rpm)),
            or_na(self.power_draw),
            or_na(pl.value.map(watts)),
            or_na(pl.range.map(|r| watts(r.min))),
            or_na(pl.range.map(|r| watts(r.max))),
            or_na(co.value.map(signed)),
            or_na(co.range.map(|r| signed(r.min))),
            or_na(co.range.map(|r| signed(r.max))),
        )
    }
}

/// Status of every selected device
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub manager: ManagerInfo,
    pub devices: Vec<DeviceSnapshot>,
}

impl TableDisplay for StatusReport {
    fn to_table(&self) -> String {
        let mut out = self.manager.to_table();
        out.push_str("\n\n");
        let devices: Vec<String> = self.devices.iter().map(|d| d.to_table()).collect();
        out.push_str(&devices.join("\n"));
        out
    }

    fn to_compact(&self) -> String {
        self.devices
            .iter()
            .map(|d| d.to_compact())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Simple message output
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
    pub success: bool,
}

impl Message {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

impl TableDisplay for Message {
    fn to_table(&self) -> String {
        if self.success {
            format!("✓ {}", self.message)
        } else {
            format!("✗ {}", self.message)
        }
    }
}

/// Results of one command across one device
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub gpu: GpuInfo,
    pub results: Vec<Message>,
}

impl Report {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|m| m.success)
    }
}

impl TableDisplay for Report {
    fn to_table(&self) -> String {
        let mut out = format!("{}\n", self.gpu);
        if self.results.is_empty() {
            out.push_str("  Nothing to do\n");
        }
        for result in &self.results {
            out.push_str(&format!("  {}\n", result.to_table()));
        }
        out
    }

    fn to_compact(&self) -> String {
        let results: Vec<String> = self.results.iter().map(|m| m.to_table()).collect();
        format!("{}: {}", self.gpu.index, results.join("; "))
    }
}
