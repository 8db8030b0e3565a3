/// A single point destined for the time-series store.
///
/// Tags and fields keep insertion order and unique keys; setting an existing
/// key replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
}

impl MetricRecord {
    pub fn new(measurement: impl Into<String>) -> Self {
        MetricRecord { measurement: measurement.into(), tags: Vec::new(), fields: Vec::new() }
    }

    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.tags, key.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        upsert(&mut self.fields, key.into(), value);
        self
    }

    /// Serializes the record without any default tags.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut buf = String::new();
        crate::line_protocol::write_record(&mut buf, self, &[]);

        buf
    }
}

fn upsert<V>(entries: &mut Vec<(String, V)>, key: String, value: V) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, v)) => *v = value,
        None => entries.push((key, value)),
    }
}
