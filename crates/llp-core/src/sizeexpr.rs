//! Size-expression parsing shared by the `--split` CLI surface and the
//! Markdown renderer's (C7) size-bound splitter.
//!
//! Accepts both IEC (`K|M|G` or `KiB|MiB|GiB`, base 1024) and SI (`KB|MB|GB`,
//! base 1000) suffixes, matching the original exporter's `parse_size_expr`
//! (`original_source/.../core/utils.py`). A bare number is bytes.

use crate::error::ConfigError;

/// Parse a human size expression (`"4M"`, `"512KiB"`, `"4MB"`, `"4096"`, ...)
/// into a byte count. Case-insensitive.
pub fn parse_size_expr(expr: &str) -> Result<u64, ConfigError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidSizeExpr(expr.to_string()));
    }
    let upper = trimmed.to_ascii_uppercase();

    let digits_end = upper
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(upper.len());
    if digits_end == 0 {
        return Err(ConfigError::InvalidSizeExpr(expr.to_string()));
    }
    let (digits, suffix) = upper.split_at(digits_end);
    let n: u64 = digits
        .parse()
        .map_err(|_| ConfigError::InvalidSizeExpr(expr.to_string()))?;

    let multiplier: u64 = match suffix {
        "" => 1,
        "K" | "KIB" => 1024,
        "M" | "MIB" => 1024 * 1024,
        "G" | "GIB" => 1024 * 1024 * 1024,
        "KB" => 1000,
        "MB" => 1_000_000,
        "GB" => 1_000_000_000,
        _ => return Err(ConfigError::InvalidSizeExpr(expr.to_string())),
    };

    Ok(n * multiplier)
}

/// Human-readable byte count for log lines (`4.0MiB`, `512.0KiB`, ...).
pub fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}
