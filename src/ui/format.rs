/// Formatea milisegundos como `1d 2h 3m 4s`, omitiendo las partes en cero.
pub fn format_time(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    // Discord rechaza campos de embed vacíos
    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// Formatea bytes en la unidad binaria más grande, con hasta dos decimales.
/// Cero se muestra en singular, `0 Byte`.
pub fn format_memory(bytes: u64) -> String {
    const SIZES: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 Byte".to_string();
    }

    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < SIZES.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, SIZES[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(180_000), "3m");
        assert_eq!(format_time(3_723_000), "1h 2m 3s");
        assert_eq!(format_time(90_061_000), "1d 1h 1m 1s");
        assert_eq!(format_time(999), "0s");
        assert_eq!(format_time(0), "0s");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(0), "0 Byte");
        assert_eq!(format_memory(512), "512 Bytes");
        assert_eq!(format_memory(1536), "1.5 KB");
        assert_eq!(format_memory(1024 * 1024), "1 MB");
        assert_eq!(format_memory(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }
}
