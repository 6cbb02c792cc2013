//! Rendering telemetry records into a prompt-ready text block.

use crate::telemetry::record::TelemetryRecord;

/// Render records into a compact textual block for inclusion in a model
/// prompt.
///
/// Pure and total: one pipe-delimited line per record, provider order
/// preserved, nothing dropped or truncated. Truncation for prompt-length
/// limits is a caller concern. An empty input yields an empty string.
pub fn format_records(records: &[TelemetryRecord]) -> String {
    records
        .iter()
        .map(|record| record.fields.join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_is_empty_string() {
        assert_eq!(format_records(&[]), "");
    }

    #[test]
    fn test_format_single_record() {
        let records = vec![TelemetryRecord::new(["2024-01-01T00:00:00Z", "500", "/api/orders"])];
        assert_eq!(format_records(&records), "2024-01-01T00:00:00Z | 500 | /api/orders");
    }

    #[test]
    fn test_format_preserves_order_and_count() {
        let records = vec![
            TelemetryRecord::new(["first", "1"]),
            TelemetryRecord::new(["second", "2"]),
            TelemetryRecord::new(["third", "3"]),
        ];
        let block = format_records(&records);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "first | 1");
        assert_eq!(lines[1], "second | 2");
        assert_eq!(lines[2], "third | 3");
    }

    #[test]
    fn test_format_is_deterministic() {
        let records = vec![
            TelemetryRecord::new(["ts", "oom-killed", "worker-7"]),
            TelemetryRecord::new(["ts2", "restarted", "worker-7"]),
        ];
        assert_eq!(format_records(&records), format_records(&records));
    }

    #[test]
    fn test_format_keeps_empty_fields() {
        let records = vec![TelemetryRecord::new(["ts", "", "detail"])];
        assert_eq!(format_records(&records), "ts |  | detail");
    }
}
