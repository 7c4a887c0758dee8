pub fn format_memory_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;

    if bytes >= 10 * GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else {
        format!("{}MB", bytes / MB)
    }
}

/// Process age for display: minutes under one hour, hours otherwise.
pub fn format_age(secs: u64) -> String {
    let hours = secs as f64 / 3600.0;
    if hours < 1.0 {
        format!("{:.1}m", secs as f64 / 60.0)
    } else {
        format!("{hours:.1}h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_below_ten_gb_in_mb() {
        assert_eq!(format_memory_size(414 * 1024 * 1024), "414MB");
    }

    #[test]
    fn memory_above_ten_gb_in_gb() {
        assert_eq!(format_memory_size(16 * 1024 * 1024 * 1024), "16.00GB");
    }

    #[test]
    fn age_under_one_hour_in_minutes() {
        assert_eq!(format_age(1650), "27.5m");
    }

    #[test]
    fn age_over_one_hour_in_hours() {
        assert_eq!(format_age(3 * 3600 + 1800), "3.5h");
    }
}
