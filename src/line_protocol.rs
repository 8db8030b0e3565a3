use std::fmt::Write;

use crate::metric::MetricRecord;

/// Appends `record` to `buf` as a single line-protocol point without a
/// trailing newline or timestamp.
///
/// Returns `false` (leaving `buf` untouched) if the record has no fields or any
/// field is not finite.
pub(crate) fn write_record(
    buf: &mut String,
    record: &MetricRecord,
    default_tags: &[(String, String)],
) -> bool {
    if record.fields.is_empty() || !record.fields.iter().all(|(_, v)| v.is_finite()) {
        return false;
    }

    escape_measurement(buf, &record.measurement);
    write_tags(buf, &record.tags, default_tags);

    let mut separator = ' ';
    for (key, value) in &record.fields {
        buf.push(separator);
        escape_key_value(buf, key);
        let _ = write!(buf, "={value}");
        separator = ',';
    }

    true
}

fn write_tags(buf: &mut String, tags: &[(String, String)], default_tags: &[(String, String)]) {
    for (k, v) in tags {
        write_single_tag(buf, k, v);
    }

    // Record tags override defaults.
    for (k, v) in default_tags {
        if !tags.iter().any(|(key, _)| key == k) {
            write_single_tag(buf, k, v);
        }
    }
}

fn write_single_tag(buf: &mut String, key: &str, value: &str) {
    buf.push(',');
    escape_key_value(buf, key);
    buf.push('=');
    escape_key_value(buf, value);
}

fn escape_measurement(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ',' | ' ' | '\\' => {
                buf.push('\\');
                buf.push(c);
            }
            _ => buf.push(c),
        }
    }
}

fn escape_key_value(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ',' | '=' | ' ' | '\\' => {
                buf.push('\\');
                buf.push(c);
            }
            _ => buf.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn line(record: &MetricRecord, default_tags: &[(String, String)]) -> String {
        let mut buf = String::new();
        write_record(&mut buf, record, default_tags);

        buf
    }

    fn defaults() -> Vec<(String, String)> {
        vec![
            ("site".to_string(), "pop-1".to_string()),
            ("router".to_string(), "default".to_string()),
        ]
    }

    #[test]
    fn pppoe_clients_zero_count() {
        let record =
            MetricRecord::new("pppoe_clients").tag("router", "10.0.0.1").field("count", 0.0);

        expect!["pppoe_clients,router=10.0.0.1 count=0"].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn fractional_and_negative_fields() {
        let record = MetricRecord::new("interface_bw")
            .tag("interface", "ether1")
            .field("rx_bps", 1600.5)
            .field("tx_bps", -8.0);

        expect!["interface_bw,interface=ether1 rx_bps=1600.5,tx_bps=-8"]
            .assert_eq(&line(&record, &[]));
    }

    #[test]
    fn large_counter_delta_has_no_exponent() {
        let record = MetricRecord::new("m").field("v", 1e21);

        expect!["m v=1000000000000000000000"].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn no_tags() {
        let record = MetricRecord::new("m").field("v", 1.0);

        expect!["m v=1"].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn escape_tag_special_chars() {
        let record = MetricRecord::new("interface_bw")
            .tag("interface", "<pppoe-bob smith>")
            .tag("caller id", "AA:BB,CC=DD")
            .field("rx_bps", 1.0);

        expect![r"interface_bw,interface=<pppoe-bob\ smith>,caller\ id=AA:BB\,CC\=DD rx_bps=1"]
            .assert_eq(&line(&record, &[]));
    }

    #[test]
    fn escape_measurement_and_field_key() {
        let record = MetricRecord::new("my bw,total").field("rx bps=x", 1.0);

        expect![r"my\ bw\,total rx\ bps\=x=1"].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn backslash_in_tag() {
        let record = MetricRecord::new("m").tag("k\\ey", "v\\al").field("v", 1.0);

        expect![r"m,k\\ey=v\\al v=1"].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn default_tags_appended_after_record_tags() {
        let record =
            MetricRecord::new("pppoe_clients").tag("router", "10.0.0.1").field("count", 3.0);

        expect!["pppoe_clients,router=10.0.0.1,site=pop-1 count=3"]
            .assert_eq(&line(&record, &defaults()));
    }

    #[test]
    fn empty_fields_skipped() {
        let record = MetricRecord::new("m").tag("a", "b");

        expect![""].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn nan_skipped() {
        let record = MetricRecord::new("m").field("a", 1.0).field("b", f64::NAN);

        expect![""].assert_eq(&line(&record, &[]));
    }

    #[test]
    fn inf_skipped() {
        let record = MetricRecord::new("m").field("a", f64::INFINITY);

        expect![""].assert_eq(&line(&record, &defaults()));
    }
}
