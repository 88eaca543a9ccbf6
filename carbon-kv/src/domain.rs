use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::{Error, Result, TtlMinutes};
use uuid::Uuid;

/// A single cached value as it is persisted in the `app` collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub cache_time: String, // RFC 3339 expiry timestamp
    pub data: String,       // JSON text of the cached value
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, cache_time: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cache_time: cache_time.into(),
            data: data.into(),
        }
    }

    /// Build an entry for `value`, expiring `ttl` minutes after `now`
    pub fn from_value<T: Serialize + ?Sized>(
        key: impl Into<String>,
        value: &T,
        ttl: TtlMinutes,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let data = serde_json::to_string(value)
            .map_err(|e| Error::Serialization(format!("Failed to serialize value: {}", e)))?;

        Ok(Self::new(key, expiry_timestamp(now, ttl)?, data))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.cache_time)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Unparseable expiry timestamps are never treated as expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }
}

/// Formats `now + ttl` the way `cacheTime` is stored
pub fn expiry_timestamp(now: DateTime<Utc>, ttl: TtlMinutes) -> Result<String> {
    TimeDelta::try_minutes(ttl.0)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|expires_at| expires_at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| Error::Serialization(format!("TTL of {} minutes is out of range", ttl.0)))
}

/// A document as returned by the store: the entry plus storage metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub revision: u64,
    #[serde(flatten)]
    pub entry: CacheEntry,
}

impl StoredRecord {
    pub fn new(entry: CacheEntry, revision: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            revision,
            entry,
        }
    }

    pub fn key(&self) -> &str {
        &self.entry.key
    }
}

/// Value read back from the cache.
///
/// Payloads that no longer parse as `T` are handed out as their raw stored
/// text instead of failing the read.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue<T> {
    Value(T),
    Raw(String),
}

impl<T: DeserializeOwned> CachedValue<T> {
    pub fn from_payload(key: &str, payload: &str) -> Self {
        match serde_json::from_str(payload) {
            Ok(value) => CachedValue::Value(value),
            Err(e) => {
                tracing::warn!("Returning raw payload for key '{}': {}", key, e);
                CachedValue::Raw(payload.to_string())
            }
        }
    }
}

impl<T> CachedValue<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            CachedValue::Value(value) => Some(value),
            CachedValue::Raw(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            CachedValue::Value(value) => Some(value),
            CachedValue::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, CachedValue::Raw(_))
    }
}

/// JSON Schema a collection validates its documents against.
///
/// Besides the standard keywords the document carries `version` and
/// `primaryKey`, which the schema registry and storage layer read back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionSchema(serde_json::Value);

impl CollectionSchema {
    pub fn from_json(schema: serde_json::Value) -> Self {
        Self(schema)
    }

    /// Schema of the `app` collection holding [`CacheEntry`] documents
    pub fn cache_entries() -> Self {
        Self(serde_json::json!({
            "title": "app-db-scheme",
            "version": 0,
            "description": "App database scheme",
            "type": "object",
            "primaryKey": "key",
            "properties": {
                "key": { "type": "string" },
                "cacheTime": { "type": "string" },
                "data": { "type": "string" }
            },
            "required": ["key", "cacheTime", "data"]
        }))
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(serde_json::Value::as_str)
    }

    /// Missing or non-integer versions count as version 0
    pub fn version(&self) -> u32 {
        self.0
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .and_then(|version| u32::try_from(version).ok())
            .unwrap_or(0)
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.0.get("primaryKey").and_then(serde_json::Value::as_str)
    }

    /// Compile into a reusable validator
    pub fn compile(&self) -> Result<jsonschema::Validator> {
        jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(&self.0)
            .map_err(|e| Error::StorageUnavailable(format!("Invalid collection schema: {}", e)))
    }
}

/// One line of the diagnostic dump
#[derive(Clone, Debug, PartialEq)]
pub struct EntrySnapshot {
    pub key: String,
    pub cache_time: String,
    pub data: CachedValue<serde_json::Value>,
    pub expired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_entry_from_value_computes_expiry() {
        let entry =
            CacheEntry::from_value("SOME_KEY1", &json!({"name": "Denis2"}), TtlMinutes(2), fixed_now())
                .unwrap();

        assert_eq!(entry.key, "SOME_KEY1");
        assert_eq!(entry.cache_time, "2026-10-19T12:02:00Z");
        assert_eq!(entry.data, r#"{"name":"Denis2"}"#);
    }

    #[test]
    fn test_entry_expiry_is_informational() {
        let entry = CacheEntry::from_value("k", &1, TtlMinutes(2), fixed_now()).unwrap();

        assert!(!entry.is_expired(fixed_now()));
        assert!(entry.is_expired(fixed_now() + TimeDelta::minutes(3)));

        let garbled = CacheEntry::new("k", "Mon Oct 19 2026", "1");
        assert!(garbled.expires_at().is_none());
        assert!(!garbled.is_expired(fixed_now()));
    }

    #[test]
    fn test_ttl_out_of_range_is_serialization_error() {
        let result = CacheEntry::from_value("k", &1, TtlMinutes(i64::MAX), fixed_now());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_payload_round_trip() {
        let values = [
            json!(null),
            json!("text"),
            json!(42.5),
            json!([1, "two", {"three": 3}]),
            json!({"name": "Denis2", "tags": ["a", "b"], "nested": {"ok": true}}),
        ];

        for value in values {
            let entry = CacheEntry::from_value("k", &value, TtlMinutes(1), fixed_now()).unwrap();
            let decoded: CachedValue<serde_json::Value> = CachedValue::from_payload("k", &entry.data);
            assert_eq!(decoded, CachedValue::Value(value));
        }
    }

    #[test]
    fn test_malformed_payload_degrades_to_raw() {
        let decoded: CachedValue<serde_json::Value> = CachedValue::from_payload("k", "{name: oops");
        assert!(decoded.is_raw());
        assert_eq!(decoded, CachedValue::Raw("{name: oops".to_string()));
        assert!(decoded.value().is_none());
    }

    #[test]
    fn test_stored_record_flattens_entry() {
        let record = StoredRecord::new(CacheEntry::new("k", "2026-10-19T12:02:00Z", "1"), 7);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["key"], "k");
        assert_eq!(json["cacheTime"], "2026-10-19T12:02:00Z");
        assert_eq!(json["data"], "1");
        assert_eq!(json["revision"], 7);

        let back: StoredRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_cache_entries_schema_metadata() {
        let schema = CollectionSchema::cache_entries();

        assert_eq!(schema.title(), Some("app-db-scheme"));
        assert_eq!(schema.version(), 0);
        assert_eq!(schema.primary_key(), Some("key"));
        assert_eq!(schema.as_json()["type"], "object");

        let json = serde_json::to_string(&schema).unwrap();
        let back: CollectionSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_cache_entries_schema_validates_documents() {
        let validator = CollectionSchema::cache_entries().compile().unwrap();

        let long_key = "k".repeat(2000);
        for key in ["SOME_KEY1", "", long_key.as_str()] {
            let entry = CacheEntry::new(key, "2026-10-19T12:02:00Z", "1");
            assert!(validator.is_valid(&serde_json::to_value(&entry).unwrap()));
        }

        assert!(!validator.is_valid(&json!({"key": "k", "cacheTime": "2026-10-19T12:02:00Z"})));
        assert!(!validator.is_valid(&json!({"key": 1, "cacheTime": "t", "data": "1"})));
        assert!(!validator.is_valid(&json!(["key", "cacheTime", "data"])));
    }

    #[test]
    fn test_invalid_schema_fails_to_compile() {
        let schema = CollectionSchema::from_json(json!({"type": "no-such-type"}));
        assert!(matches!(schema.compile(), Err(Error::StorageUnavailable(_))));
        assert_eq!(schema.version(), 0);
        assert_eq!(schema.primary_key(), None);
    }

    #[test]
    fn test_raw_fallback_logs_warning_with_key() {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .finish();

        let decoded: CachedValue<i32> = tracing::subscriber::with_default(subscriber, || {
            CachedValue::from_payload("SOME_KEY1", "not json")
        });

        assert!(decoded.is_raw());
        let output = buffer.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("SOME_KEY1"));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}
