use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Replace `${name}` placeholders in `template` with the given values.
/// Unknown placeholders are left as-is.
pub fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("${{{}}}", name), value);
    }
    out
}

static BYTE_SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(b|kb|kib|mb|mib|gb|gib|tb|tib)?\s*$").expect("valid byte size regex")
});

/// Parse a human readable size such as `"512"`, `"10KB"` or `"1.5 MB"`.
/// Units are binary (1 KB = 1024 bytes).
pub fn parse_byte_size(s: &str) -> Result<u64> {
    let caps = BYTE_SIZE_RE
        .captures(s)
        .ok_or_else(|| anyhow!("invalid size: {:?}", s))?;
    let value: f64 = caps[1].parse().map_err(|e| anyhow!("invalid size {:?}: {}", s, e))?;
    let unit = caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
    let multiplier: u64 = match unit.as_str() {
        "" | "b" => 1,
        "kb" | "kib" => 1 << 10,
        "mb" | "mib" => 1 << 20,
        "gb" | "gib" => 1 << 30,
        "tb" | "tib" => 1 << 40,
        _ => unreachable!("regex only matches known units"),
    };
    Ok((value * multiplier as f64).floor() as u64)
}

/// Format a byte count for log output, e.g. `"1.5 KB"`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{} B", bytes);
    }
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", s, UNITS[unit])
}
