use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use sqlbridge::drivers::builtin_definitions;
use sqlbridge::error::{Error, ErrorCategory};
use sqlbridge::transport::{InMemoryConnector, InMemoryResultSet, NativeCell};
use sqlbridge::types::{ColumnMetadata, SqlDateTime, SqlType};
use sqlbridge::{
    CanonicalType, CanonicalValue, Capabilities, Connection, DriverDefinition, DriverProfile,
    DriverRegistry,
};

const ALL_TYPES: [CanonicalType; 14] = [
    CanonicalType::SmallInt,
    CanonicalType::BigInt,
    CanonicalType::Float,
    CanonicalType::Decimal,
    CanonicalType::Boolean,
    CanonicalType::String,
    CanonicalType::Bytes,
    CanonicalType::Date,
    CanonicalType::Time,
    CanonicalType::Timestamp,
    CanonicalType::ClassRef,
    CanonicalType::SerializedObject,
    CanonicalType::Regex,
    CanonicalType::Nil,
];

fn registry_for(connector: &InMemoryConnector) -> DriverRegistry {
    builtin_definitions()
        .into_iter()
        .fold(DriverRegistry::builder(), |builder, def| {
            let scheme = def.scheme();
            builder
                .definition(def)
                .default_connector(scheme, Arc::new(connector.clone()))
        })
        .build()
}

fn descriptor_for(scheme: &str) -> &'static str {
    match scheme {
        "sqlite3" => "sqlite3:/tmp/test.db",
        "derby" => "derby:memory:test",
        "h2" => "h2:mem:test",
        "hsqldb" => "hsqldb:mem:test",
        "postgres" => "postgres://localhost/test",
        "oracle" => "oracle://db1:1521/XE",
        other => panic!("no descriptor for {other}"),
    }
}

async fn open(connector: &InMemoryConnector, scheme: &str) -> Connection {
    Connection::open(&registry_for(connector), descriptor_for(scheme))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_null_decodes_to_nil_for_every_backend_and_type() {
    for def in builtin_definitions() {
        let builder = ALL_TYPES.iter().enumerate().fold(
            InMemoryResultSet::builder(),
            |builder, (i, ty)| {
                let sql_type = if *ty == CanonicalType::Time {
                    SqlType::Time
                } else {
                    SqlType::Varchar
                };
                builder.column(&format!("c{i}"), sql_type)
            },
        );
        let result = builder.row(vec![NativeCell::Null; ALL_TYPES.len()]).build();
        let connector = InMemoryConnector::default().with_result(result);
        let mut conn = open(&connector, def.scheme()).await;

        let row = conn
            .query("SELECT * FROM t", &[], Some(&ALL_TYPES))
            .await
            .unwrap()
            .single_row()
            .unwrap();

        for (value, ty) in row.values().iter().zip(ALL_TYPES) {
            assert!(
                value.is_nil(),
                "{}: {ty} decoded NULL as {value:?}",
                def.module_name()
            );
        }
        conn.dispose().await;
    }
}

#[tokio::test]
async fn test_zero_timestamp_decodes_to_nil() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("created_at", SqlType::Timestamp)
            .row(vec![NativeCell::DateTime(SqlDateTime::default())])
            .build(),
    );
    let mut conn = open(&connector, "h2").await;

    let row = conn
        .query("SELECT created_at FROM t", &[], None)
        .await
        .unwrap()
        .single_row()
        .unwrap();
    assert_eq!(row.get(0), Some(&CanonicalValue::Nil));
    conn.dispose().await;
}

/// A backend whose epoch timestamps are real values.
struct EpochKeepingDefinition {
    profile: DriverProfile,
}

impl DriverDefinition for EpochKeepingDefinition {
    fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    fn is_null_timestamp(&self, value: &SqlDateTime) -> bool {
        value.is_zero()
    }
}

#[tokio::test]
async fn test_epoch_sentinel_is_overridable_per_backend() {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let result = || {
        InMemoryResultSet::builder()
            .column("created_at", SqlType::Timestamp)
            .row(vec![NativeCell::from(epoch)])
            .build()
    };
    let connector = InMemoryConnector::default()
        .with_result(result())
        .with_result(result());
    let registry = DriverRegistry::builder()
        .with_builtin_definitions()
        .definition(Arc::new(EpochKeepingDefinition {
            profile: DriverProfile::new("epochdb", "epochdb", "EpochDb")
                .with_capabilities(Capabilities::default()),
        }))
        .default_connector("h2", Arc::new(connector.clone()))
        .default_connector("epochdb", Arc::new(connector.clone()))
        .build();

    let mut h2 = Connection::open(&registry, "h2:mem:test").await.unwrap();
    let mut faithful = Connection::open(&registry, "epochdb:mem:test").await.unwrap();

    let row = h2
        .query("SELECT created_at FROM t", &[], None)
        .await
        .unwrap()
        .single_row()
        .unwrap();
    assert!(row.values()[0].is_nil());
    let row = faithful
        .query("SELECT created_at FROM t", &[], None)
        .await
        .unwrap()
        .single_row()
        .unwrap();
    assert_eq!(row.values()[0], CanonicalValue::Timestamp(epoch));

    h2.dispose().await;
    faithful.dispose().await;
}

#[tokio::test]
async fn test_zero_timestamp_text_decodes_to_nil_on_sqlite() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("created_at", SqlType::Varchar)
            .row(vec![NativeCell::from("0000-00-00 00:00:00")])
            .build(),
    );
    let mut conn = open(&connector, "sqlite3").await;

    let row = conn
        .query("SELECT created_at FROM t", &[], Some(&[CanonicalType::Timestamp]))
        .await
        .unwrap()
        .single_row()
        .unwrap();
    assert!(row.values()[0].is_nil());
    conn.dispose().await;
}

#[tokio::test]
async fn test_timestamp_keeps_milliseconds() {
    let stored = NaiveDate::from_ymd_opt(2009, 5, 17)
        .unwrap()
        .and_hms_nano_opt(12, 30, 45, 123_456_789)
        .unwrap();
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("created_at", SqlType::Timestamp)
            .row(vec![NativeCell::from(stored)])
            .build(),
    );
    let mut conn = open(&connector, "derby").await;

    let rows = conn.query("SELECT created_at FROM t", &[], None).await.unwrap();
    let expected = NaiveDate::from_ymd_opt(2009, 5, 17)
        .unwrap()
        .and_hms_milli_opt(12, 30, 45, 123)
        .unwrap();
    assert_eq!(rows.rows_ref()[0].values()[0], CanonicalValue::Timestamp(expected));
    assert_eq!(rows.types(), &[CanonicalType::Timestamp]);
    conn.dispose().await;
}

#[tokio::test]
async fn test_integer_overflow_falls_back_to_big_integer() {
    for scheme in ["h2", "sqlite3", "postgres"] {
        let connector = InMemoryConnector::default().with_result(
            InMemoryResultSet::builder()
                .column("n", SqlType::BigInt)
                .row(vec![NativeCell::Number("9223372036854775808".to_string())])
                .row(vec![NativeCell::Long(42)])
                .build(),
        );
        let mut conn = open(&connector, scheme).await;

        let rows = conn.query("SELECT n FROM t", &[], None).await.unwrap().rows();
        assert_eq!(
            rows[0].values()[0],
            CanonicalValue::BigInt(9_223_372_036_854_775_808),
            "{scheme}"
        );
        assert_eq!(rows[1].values()[0], CanonicalValue::SmallInt(42), "{scheme}");
        conn.dispose().await;
    }
}

#[tokio::test]
async fn test_large_blob_is_reassembled_and_stream_closed() {
    let blob: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("data", SqlType::Blob)
            .row(vec![NativeCell::Bytes(blob.clone())])
            .build(),
    );
    let mut conn = open(&connector, "hsqldb").await;

    let row = conn
        .query("SELECT data FROM t", &[], None)
        .await
        .unwrap()
        .single_row()
        .unwrap();

    assert_eq!(row.get_by_name("DATA").unwrap().as_bytes(), Some(blob.as_slice()));
    assert_eq!(connector.streams_opened(), 1);
    assert_eq!(connector.open_stream_count(), 0);
    conn.dispose().await;
}

#[tokio::test]
async fn test_failed_blob_read_still_closes_stream() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("data", SqlType::Blob)
            .row(vec![NativeCell::FailingStream(vec![7; 5000])])
            .build(),
    );
    let mut conn = open(&connector, "derby").await;

    let err = conn.query("SELECT data FROM t", &[], None).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Decode);
    let driver_err = err.driver_error().unwrap();
    assert_eq!(driver_err.module, "Derby");
    assert_eq!(driver_err.sql_state.as_deref(), Some("58030"));
    assert_eq!(connector.streams_opened(), 1);
    assert_eq!(connector.open_stream_count(), 0);
    conn.dispose().await;
}

#[tokio::test]
async fn test_serialized_object_failures_decode_to_nil() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("payload", SqlType::JavaObject)
            .row(vec![NativeCell::from(r#"{"id": 1, "tags": ["a"]}"#)])
            .row(vec![NativeCell::from("\u{0}\u{5}truncated")])
            .build(),
    );
    let mut conn = open(&connector, "h2").await;

    let rows = conn.query("SELECT payload FROM t", &[], None).await.unwrap().rows();

    assert_eq!(
        rows[0].values()[0],
        CanonicalValue::SerializedObject(json!({"id": 1, "tags": ["a"]}))
    );
    assert_eq!(rows[1].values()[0], CanonicalValue::Nil);
    assert_eq!(connector.open_stream_count(), 0);
    conn.dispose().await;
}

#[tokio::test]
async fn test_oracle_number_precision_inference() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column_with(ColumnMetadata::new("active", SqlType::Numeric).with_precision(1, 0))
            .column_with(ColumnMetadata::new("qty", SqlType::Numeric).with_precision(10, 0))
            .column_with(ColumnMetadata::new("price", SqlType::Numeric).with_precision(10, 2))
            .column("hired", SqlType::Date)
            .row(vec![
                NativeCell::Number("1".to_string()),
                NativeCell::Number("12".to_string()),
                NativeCell::Number("9.95".to_string()),
                NativeCell::from(NaiveDate::from_ymd_opt(2009, 5, 17).unwrap()),
            ])
            .build(),
    );
    let mut conn = open(&connector, "oracle").await;

    let result = conn.query("SELECT * FROM emp", &[], None).await.unwrap();
    assert_eq!(
        result.types(),
        &[
            CanonicalType::Boolean,
            CanonicalType::SmallInt,
            CanonicalType::Decimal,
            CanonicalType::Time,
        ]
    );

    let row = result.single_row().unwrap();
    assert_eq!(row.values()[0], CanonicalValue::Boolean(true));
    assert_eq!(row.values()[1], CanonicalValue::SmallInt(12));
    assert_eq!(row.values()[2], CanonicalValue::Decimal("9.95".parse().unwrap()));
    assert_eq!(
        row.values()[3],
        CanonicalValue::Time(
            NaiveDate::from_ymd_opt(2009, 5, 17)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        )
    );
    conn.dispose().await;
}

#[tokio::test]
async fn test_sqlite_reads_temporal_and_numeric_text() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("d", SqlType::Varchar)
            .column("ts", SqlType::Varchar)
            .column("price", SqlType::Varchar)
            .column("ratio", SqlType::Varchar)
            .row(vec![
                NativeCell::from("2008-01-02"),
                NativeCell::from("2008-01-02T03:04:05+01:00"),
                NativeCell::from("12.50"),
                NativeCell::from("0.25"),
            ])
            .build(),
    );
    let mut conn = open(&connector, "sqlite3").await;

    let types = [
        CanonicalType::Date,
        CanonicalType::Timestamp,
        CanonicalType::Decimal,
        CanonicalType::Float,
    ];
    let row = conn
        .query("SELECT d, ts, price, ratio FROM t", &[], Some(&types))
        .await
        .unwrap()
        .single_row()
        .unwrap();

    let date = NaiveDate::from_ymd_opt(2008, 1, 2).unwrap();
    assert_eq!(row.values()[0], CanonicalValue::Date(date));
    assert_eq!(
        row.values()[1],
        CanonicalValue::Timestamp(date.and_hms_opt(2, 4, 5).unwrap())
    );
    assert_eq!(row.values()[2], CanonicalValue::Decimal("12.50".parse().unwrap()));
    assert_eq!(row.values()[3], CanonicalValue::Float(0.25));
    conn.dispose().await;
}

#[tokio::test]
async fn test_field_count_mismatch() {
    let connector = InMemoryConnector::default().with_result(
        InMemoryResultSet::builder()
            .column("a", SqlType::Integer)
            .column("b", SqlType::Integer)
            .build(),
    );
    let mut conn = open(&connector, "h2").await;

    let err = conn
        .query("SELECT a, b FROM t", &[], Some(&[CanonicalType::SmallInt]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::FieldCountMismatch {
            expected: 1,
            actual: 2
        }
    ));
    conn.dispose().await;
}
