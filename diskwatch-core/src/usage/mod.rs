//! Disk usage parsing and threshold evaluation
//!
//! Parses the human-readable tabular output of `df -h` into usage records
//! and filters them against a utilization threshold. Both operations are
//! pure; malformed lines are skipped with a diagnostic rather than failing
//! the whole parse.

use std::fmt::Write as _;

/// Remote command whose output [`parse_df_output`] understands.
///
/// Columns: `Filesystem Size Used Avail Use% Mounted-on`, one header line.
pub const DF_COMMAND: &str = "df -h";

/// Minimum whitespace-separated fields for a parseable row
const MIN_FIELDS: usize = 6;

/// Disk usage of one filesystem, as reported by `df -h`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Filesystem identifier (device or pseudo-filesystem name)
    pub filesystem: String,
    /// Total size, human readable (e.g. `50G`)
    pub size: String,
    /// Used space, human readable
    pub used: String,
    /// Available space, human readable
    pub available: String,
    /// Utilization percentage, 0-100
    pub use_percent: u8,
    /// Mount path
    pub mounted_on: String,
}

/// Parses `df -h` output into usage records.
///
/// The first line is the header and is discarded. Rows with fewer than six
/// whitespace-separated fields (wrapped or otherwise malformed output) and
/// rows whose `Use%` field does not parse as an integer percentage are
/// skipped with a diagnostic. An empty result is valid; the caller decides
/// whether that means "nothing mounted" or "command produced no table".
pub fn parse_df_output(output: &str) -> Vec<UsageRecord> {
    let mut records = Vec::new();

    for line in output.trim().lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            tracing::debug!(line, "Skipping row with too few fields");
            continue;
        }

        let Some(use_percent) = parse_percent(fields[4]) else {
            tracing::warn!(line, field = fields[4], "Skipping row with unparseable Use%");
            continue;
        };

        let record = UsageRecord {
            filesystem: fields[0].to_string(),
            size: fields[1].to_string(),
            used: fields[2].to_string(),
            available: fields[3].to_string(),
            use_percent,
            mounted_on: fields[5].to_string(),
        };
        tracing::trace!(mount = %record.mounted_on, percent = record.use_percent, "Parsed row");
        records.push(record);
    }

    records
}

/// Parses a `Use%` field like `85%` into its integer value
fn parse_percent(field: &str) -> Option<u8> {
    field.strip_suffix('%')?.parse().ok()
}

/// Returns the records at or above the threshold, preserving input order.
///
/// The boundary is inclusive: utilization exactly equal to the threshold
/// counts as exceeding.
pub fn over_threshold(records: &[UsageRecord], threshold: u8) -> Vec<UsageRecord> {
    let exceeding: Vec<UsageRecord> = records
        .iter()
        .filter(|r| r.use_percent >= threshold)
        .cloned()
        .collect();

    if exceeding.is_empty() {
        tracing::info!(threshold, "All filesystems below threshold");
    } else {
        tracing::warn!(
            threshold,
            count = exceeding.len(),
            "Filesystems exceeding threshold"
        );
    }
    exceeding
}

/// Formats the alert body for filesystems exceeding the threshold.
///
/// One bullet per record: mount path, utilization, used/size, and the
/// filesystem identifier.
pub fn format_alert_body(host: &str, records: &[UsageRecord], threshold: u8) -> String {
    let mut body = format!(
        "Disk usage alert for {host}\nThreshold: {threshold}%\n\nFilesystems exceeding threshold:\n"
    );
    for record in records {
        let _ = writeln!(
            body,
            "  - {}: {}% ({}/{}) - {}",
            record.mounted_on, record.use_percent, record.used, record.size, record.filesystem
        );
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DF: &str = "\
Filesystem Size Used Avail Use% Mounted on
/dev/sda1 50G 40G 10G 80% /
/dev/sdb1 100G 85G 15G 85% /data
tmpfs 7.8G 1.2G 6.6G 16% /tmp";

    #[test]
    fn test_parse_well_formed_output() {
        let records = parse_df_output(SAMPLE_DF);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            UsageRecord {
                filesystem: "/dev/sda1".to_string(),
                size: "50G".to_string(),
                used: "40G".to_string(),
                available: "10G".to_string(),
                use_percent: 80,
                mounted_on: "/".to_string(),
            }
        );
        assert_eq!(records[1].use_percent, 85);
        assert_eq!(records[1].mounted_on, "/data");
        assert_eq!(records[2].use_percent, 16);
        assert_eq!(records[2].mounted_on, "/tmp");
    }

    #[test]
    fn test_parse_skips_short_rows() {
        let output = "\
Filesystem Size Used Avail Use% Mounted on
/dev/mapper/vg0-long--volume--name
  50G 40G 10G 80% /
/dev/sdb1 100G 85G 15G 85% /data";
        let records = parse_df_output(output);
        // The wrapped row splits into two short rows; both are skipped
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filesystem, "/dev/sdb1");
    }

    #[test]
    fn test_parse_skips_non_numeric_percent() {
        let output = "\
Filesystem Size Used Avail Use% Mounted on
/dev/sda1 50G 40G 10G abc% /
/dev/sdb1 100G 85G 15G 85 /data
tmpfs 7.8G 1.2G 6.6G 16% /tmp";
        let records = parse_df_output(output);
        // `abc%` does not parse, `85` is missing the suffix
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filesystem, "tmpfs");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_df_output("").is_empty());
    }

    #[test]
    fn test_parse_header_only() {
        assert!(parse_df_output("Filesystem Size Used Avail Use% Mounted on").is_empty());
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let records = parse_df_output(SAMPLE_DF);
        let exceeding = over_threshold(&records, 80);
        assert_eq!(exceeding.len(), 2);
        // 80% equals the threshold and is included; order is preserved
        assert_eq!(exceeding[0].filesystem, "/dev/sda1");
        assert_eq!(exceeding[1].filesystem, "/dev/sdb1");
    }

    #[test]
    fn test_threshold_filter_is_pure() {
        let records = parse_df_output(SAMPLE_DF);
        let first = over_threshold(&records, 80);
        let second = over_threshold(&records, 80);
        assert_eq!(first, second);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_threshold_none_exceeding() {
        let records = parse_df_output(SAMPLE_DF);
        assert!(over_threshold(&records, 90).is_empty());
    }

    #[test]
    fn test_format_alert_body() {
        let records = vec![UsageRecord {
            filesystem: "/dev/sda1".to_string(),
            size: "50G".to_string(),
            used: "45G".to_string(),
            available: "5G".to_string(),
            use_percent: 90,
            mounted_on: "/".to_string(),
        }];
        let body = format_alert_body("192.168.1.10", &records, 80);
        assert!(body.contains("192.168.1.10"));
        assert!(body.contains("90%"));
        assert!(body.contains("/"));
        assert!(body.contains("45G/50G"));
        assert!(body.contains("/dev/sda1"));
    }
}
