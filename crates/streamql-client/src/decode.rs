//! Result decoding: query response messages back into native records.

use std::fmt;
use std::marker::PhantomData;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::{self, DeserializeOwned, DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value as Json};

use streamql_query::schema::{
    parse_columns, remote_schema_representation, NativeKind, Record, RelationSchema,
};
use streamql_query::Kind;

use crate::error::{ClientError, ClientResult};
use crate::protocol::strip_array_punctuation;

/// First message of a query response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryHeader {
    /// Identifier of a push query, used by TERMINATE.
    #[serde(rename = "queryId", default)]
    pub query_id: Option<String>,
    /// Column list, e.g. `` `ID` BIGINT, `NAME` STRING ``.
    pub schema: String,
}

impl QueryHeader {
    /// Parses the column list into a schema named `relation`.
    pub fn relation_schema(&self, relation: &str) -> ClientResult<RelationSchema> {
        Ok(remote_schema_representation(relation, &self.schema)?)
    }
}

/// One message of a query response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Column header.
    Header(QueryHeader),
    /// Positional column values.
    Row(Vec<Json>),
    /// End of the query, with the engine's reason.
    Final(String),
    /// Error reported in-band by the engine.
    Error(String),
}

impl StreamMessage {
    /// Parses one line of a streaming response.
    ///
    /// Returns `None` for blank lines and bare array brackets.
    pub fn parse(line: &str) -> ClientResult<Option<Self>> {
        let line = strip_array_punctuation(line);
        if line.is_empty() {
            return Ok(None);
        }
        let json: Json = serde_json::from_str(line)?;
        Self::from_json(json).map(Some)
    }

    /// Parses a buffered response holding a JSON array of messages.
    pub fn parse_body(body: &[u8]) -> ClientResult<Vec<Self>> {
        let items: Vec<Json> = serde_json::from_slice(body)?;
        items.into_iter().map(Self::from_json).collect()
    }

    /// Interprets one message object.
    pub fn from_json(json: Json) -> ClientResult<Self> {
        let mut object = match json {
            Json::Object(object) => object,
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected a message object, got {}",
                    other
                )))
            }
        };
        if let Some(header) = object.remove("header") {
            return Ok(Self::Header(serde_json::from_value(header)?));
        }
        if let Some(row) = object.remove("row") {
            let columns = match row {
                Json::Object(mut row) => row.remove("columns"),
                _ => None,
            };
            return match columns {
                Some(Json::Array(values)) => Ok(Self::Row(values)),
                _ => Err(ClientError::Protocol("row without columns".to_string())),
            };
        }
        if let Some(message) = object.remove("finalMessage") {
            return Ok(Self::Final(text_of(message)));
        }
        if let Some(error) = object.remove("errorMessage") {
            let message = match error {
                Json::Object(mut error) => error.remove("message").map(text_of).unwrap_or_default(),
                other => text_of(other),
            };
            return Ok(Self::Error(message));
        }
        Err(ClientError::Protocol(format!(
            "unrecognized message: {}",
            Json::Object(object)
        )))
    }
}

fn text_of(json: Json) -> String {
    match json {
        Json::String(s) => s,
        other => other.to_string(),
    }
}

/// Pairs header column names with positional values.
///
/// ```
/// use serde_json::json;
/// use streamql_client::decode::parse_headers_and_values;
///
/// let row = parse_headers_and_values("`id` INTEGER,`name` VARCHAR", &[json!(1), json!("a")]).unwrap();
/// assert_eq!(serde_json::Value::Object(row), json!({"id": 1, "name": "a"}));
/// ```
pub fn parse_headers_and_values(header: &str, values: &[Json]) -> ClientResult<Map<String, Json>> {
    let columns = parse_columns(header)?;
    if columns.len() != values.len() {
        return Err(ClientError::Protocol(format!(
            "header has {} columns but row has {} values",
            columns.len(),
            values.len()
        )));
    }
    Ok(columns
        .iter()
        .zip(values)
        .map(|(column, value)| (column.name().to_string(), value.clone()))
        .collect())
}

/// Where a header column lands in the target record.
#[derive(Debug, Clone)]
struct Slot {
    column: usize,
    field: String,
    kind: Kind,
    nullable: bool,
}

/// Decodes rows of one query into `T`.
///
/// Header columns are matched to the fields `T` declares through
/// [`Record`], ignoring case. Columns without a matching field are
/// skipped. The serde field names of `T` must equal its declared names.
pub struct RowDecoder<T> {
    header: String,
    columns: usize,
    slots: Vec<Slot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for RowDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowDecoder")
            .field("header", &self.header)
            .field("slots", &self.slots)
            .finish()
    }
}

impl<T: Record + DeserializeOwned> RowDecoder<T> {
    /// Builds a decoder for rows described by `header`.
    pub fn new(header: &QueryHeader) -> ClientResult<Self> {
        let columns = parse_columns(&header.schema)?;
        let fields = T::fields();
        let slots = columns
            .iter()
            .enumerate()
            .filter_map(|(index, column)| {
                let field = fields
                    .iter()
                    .find(|f| f.name().eq_ignore_ascii_case(column.name()))?;
                match field.kind() {
                    NativeKind::Mapped(kind) => Some(Slot {
                        column: index,
                        field: field.name().to_string(),
                        kind: kind.clone(),
                        nullable: field.is_nullable(),
                    }),
                    NativeKind::Unmapped(_) => None,
                }
            })
            .collect();
        Ok(Self {
            header: header.schema.clone(),
            columns: columns.len(),
            slots,
            _marker: PhantomData,
        })
    }

    /// The schema string the decoder was built from.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Decodes one row of positional values.
    pub fn decode(&self, values: &[Json]) -> ClientResult<T> {
        if values.len() != self.columns {
            return Err(self.failure(
                "*",
                values,
                format!("expected {} values, got {}", self.columns, values.len()),
            ));
        }
        let mut object = Map::new();
        for slot in &self.slots {
            let converted = convert(&slot.kind, &values[slot.column], slot.nullable)
                .map_err(|reason| self.failure(&slot.field, values, reason))?;
            object.insert(slot.field.clone(), converted);
        }
        let mut failed = None;
        let row = RowDeserializer {
            entries: object,
            failed: &mut failed,
        };
        <T as Deserialize>::deserialize(row).map_err(|e| {
            let field = failed.as_deref().unwrap_or("*");
            self.failure(field, values, e.to_string())
        })
    }

    fn failure(&self, field: &str, values: &[Json], reason: String) -> ClientError {
        ClientError::Decode {
            field: field.to_string(),
            header: self.header.clone(),
            row: Json::Array(values.to_vec()).to_string(),
            reason,
        }
    }
}

/// Hands converted fields to `T` one at a time, noting the field being
/// read when deserialization fails.
struct RowDeserializer<'a> {
    entries: Map<String, Json>,
    failed: &'a mut Option<String>,
}

impl<'de, 'a> Deserializer<'de> for RowDeserializer<'a> {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(RowAccess {
            entries: self.entries.into_iter(),
            pending: None,
            failed: self.failed,
        })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct RowAccess<'a> {
    entries: serde_json::map::IntoIter,
    pending: Option<(String, Json)>,
    failed: &'a mut Option<String>,
}

impl<'de, 'a> MapAccess<'de> for RowAccess<'a> {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        let parsed = seed.deserialize(Json::String(key.clone()))?;
        self.pending = Some((key, value));
        Ok(Some(parsed))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        let (key, value) = self
            .pending
            .take()
            .ok_or_else(|| de::Error::custom("value requested before its key"))?;
        seed.deserialize(value).map_err(|e| {
            *self.failed = Some(key);
            e
        })
    }
}

/// Converts a remote value into the JSON shape `kind`'s native type reads.
fn convert(kind: &Kind, value: &Json, nullable: bool) -> Result<Json, String> {
    if value.is_null() {
        return if nullable {
            Ok(Json::Null)
        } else {
            Err("null value for a non-nullable field".to_string())
        };
    }
    let mismatch = || format!("expected {}, got {}", kind, value);
    match kind {
        Kind::Boolean => value.as_bool().map(Json::Bool).ok_or_else(mismatch),
        Kind::Int => value
            .as_i64()
            .filter(|i| i32::try_from(*i).is_ok())
            .map(Json::from)
            .ok_or_else(mismatch),
        Kind::BigInt => match (value.as_i64(), value.as_u64()) {
            (Some(i), _) => Ok(Json::from(i)),
            (None, Some(u)) => Ok(Json::from(u)),
            _ => Err(mismatch()),
        },
        Kind::Double => value.as_f64().map(Json::from).ok_or_else(mismatch),
        Kind::String => value
            .as_str()
            .map(|s| Json::String(s.to_string()))
            .ok_or_else(mismatch),
        Kind::Bytes => match value {
            Json::String(encoded) => STANDARD
                .decode(encoded)
                .map(|bytes| Json::Array(bytes.into_iter().map(Json::from).collect()))
                .map_err(|e| format!("invalid base64: {}", e)),
            Json::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .filter(|b| *b <= u64::from(u8::MAX))
                        .map(Json::from)
                        .ok_or_else(mismatch)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array),
            _ => Err(mismatch()),
        },
        Kind::Array(element) => match value {
            Json::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    convert(element, item, false).map_err(|reason| format!("element {}: {}", i, reason))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array),
            _ => Err(mismatch()),
        },
        Kind::Map(element) => match value {
            Json::Object(entries) => entries
                .iter()
                .map(|(key, item)| {
                    convert(element, item, false)
                        .map(|converted| (key.clone(), converted))
                        .map_err(|reason| format!("entry {}: {}", key, reason))
                })
                .collect::<Result<Map<_, _>, _>>()
                .map(Json::Object),
            _ => Err(mismatch()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::json;
    use streamql_query::schema::NativeField;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Order {
        id: i64,
        item: String,
        qty: i32,
        note: Option<String>,
    }

    impl Record for Order {
        fn fields() -> Vec<NativeField> {
            vec![
                NativeField::of::<i64>("id").primary(),
                NativeField::of::<String>("item"),
                NativeField::of::<i32>("qty"),
                NativeField::of::<Option<String>>("note"),
            ]
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Everything {
        flag: bool,
        small: i32,
        big: i64,
        ratio: f64,
        name: String,
        blob: Vec<u8>,
        tags: Vec<String>,
        scores: BTreeMap<String, i64>,
    }

    impl Record for Everything {
        fn fields() -> Vec<NativeField> {
            vec![
                NativeField::of::<bool>("flag"),
                NativeField::of::<i32>("small"),
                NativeField::of::<i64>("big"),
                NativeField::of::<f64>("ratio"),
                NativeField::of::<String>("name"),
                NativeField::of::<Vec<u8>>("blob"),
                NativeField::of::<Vec<String>>("tags"),
                NativeField::of::<BTreeMap<String, i64>>("scores"),
            ]
        }
    }

    fn header(schema: &str) -> QueryHeader {
        QueryHeader {
            query_id: None,
            schema: schema.to_string(),
        }
    }

    #[test]
    fn test_parse_headers_and_values() {
        let row = parse_headers_and_values("`id` INTEGER,`name` VARCHAR", &[json!(1), json!("a")])
            .unwrap();
        assert_eq!(Json::Object(row), json!({"id": 1, "name": "a"}));

        let err = parse_headers_and_values("`id` INTEGER", &[json!(1), json!(2)]).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_parse_messages() {
        let header = StreamMessage::parse(
            r#"[{"header":{"queryId":"q_1","schema":"`ID` BIGINT, `ITEM` STRING"}},"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            header,
            StreamMessage::Header(QueryHeader {
                query_id: Some("q_1".to_string()),
                schema: "`ID` BIGINT, `ITEM` STRING".to_string(),
            })
        );
        assert_eq!(
            StreamMessage::parse(r#"{"row":{"columns":[1,"a"]}},"#).unwrap(),
            Some(StreamMessage::Row(vec![json!(1), json!("a")]))
        );
        assert_eq!(
            StreamMessage::parse(r#"{"finalMessage":"Limit Reached"}]"#).unwrap(),
            Some(StreamMessage::Final("Limit Reached".to_string()))
        );
        assert_eq!(
            StreamMessage::parse(r#"{"errorMessage":{"message":"boom"}}"#).unwrap(),
            Some(StreamMessage::Error("boom".to_string()))
        );
        assert_eq!(StreamMessage::parse("").unwrap(), None);
        assert!(StreamMessage::parse(r#"{"other":1}"#).is_err());
        assert!(StreamMessage::parse("[1]").is_err());
    }

    #[test]
    fn test_parse_body() {
        let body = br#"[{"header":{"queryId":null,"schema":"`ID` BIGINT"}},{"row":{"columns":[7]}}]"#;
        let messages = StreamMessage::parse_body(body).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], StreamMessage::Row(vec![json!(7)]));
    }

    #[test]
    fn test_decode_case_insensitive_and_skips_unknown_columns() {
        let decoder = RowDecoder::<Order>::new(&header(
            "`ID` BIGINT KEY, `ITEM` STRING, `QTY` INTEGER, `NOTE` STRING, `EXTRA` DOUBLE",
        ))
        .unwrap();
        let order = decoder
            .decode(&[json!(1), json!("pen"), json!(3), Json::Null, json!(1.5)])
            .unwrap();
        assert_eq!(
            order,
            Order {
                id: 1,
                item: "pen".to_string(),
                qty: 3,
                note: None,
            }
        );
    }

    #[test]
    fn test_decode_failure_names_field_header_and_row() {
        let decoder =
            RowDecoder::<Order>::new(&header("`ID` BIGINT, `ITEM` STRING, `QTY` INT, `NOTE` STRING"))
                .unwrap();

        let err = decoder
            .decode(&[json!(1), json!("pen"), json!("three"), Json::Null])
            .unwrap_err();
        match err {
            ClientError::Decode {
                field, header, row, ..
            } => {
                assert_eq!(field, "qty");
                assert!(header.contains("`QTY` INT"));
                assert!(row.contains("three"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // INT out of range
        assert!(decoder
            .decode(&[json!(1), json!("pen"), json!(i64::MAX), Json::Null])
            .is_err());
        // null into a non-nullable field
        assert!(decoder
            .decode(&[json!(1), Json::Null, json!(1), Json::Null])
            .is_err());
        // wrong arity
        assert!(decoder.decode(&[json!(1)]).is_err());
    }

    #[test]
    fn test_native_range_failure_names_field() {
        #[derive(Debug, Deserialize)]
        struct Sensor {
            level: u8,
        }

        impl Record for Sensor {
            fn fields() -> Vec<NativeField> {
                vec![NativeField::of::<u8>("level")]
            }
        }

        let decoder = RowDecoder::<Sensor>::new(&header("`LEVEL` INT")).unwrap();
        assert_eq!(decoder.decode(&[json!(200)]).unwrap().level, 200);
        match decoder.decode(&[json!(300)]).unwrap_err() {
            ClientError::Decode {
                field, row, reason, ..
            } => {
                assert_eq!(field, "level");
                assert_eq!(row, "[300]");
                assert!(reason.contains("u8"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_every_kind() {
        let original = Everything {
            flag: true,
            small: -7,
            big: i64::from(i32::MAX) + 10,
            ratio: 0.25,
            name: "it's".to_string(),
            blob: vec![0, 1, 254, 255],
            tags: vec!["a".to_string(), "b".to_string()],
            scores: BTreeMap::from([("x".to_string(), 1), ("y".to_string(), -2)]),
        };
        let decoder = RowDecoder::<Everything>::new(&header(
            "`FLAG` BOOLEAN, `SMALL` INT, `BIG` BIGINT, `RATIO` DOUBLE, `NAME` STRING, \
             `BLOB` BYTES, `TAGS` ARRAY<STRING>, `SCORES` MAP<STRING, BIGINT>",
        ))
        .unwrap();
        let row = [
            json!(original.flag),
            json!(original.small),
            json!(original.big),
            json!(original.ratio),
            json!(original.name),
            json!(STANDARD.encode(&original.blob)),
            json!(original.tags),
            json!(original.scores),
        ];
        assert_eq!(decoder.decode(&row).unwrap(), original);
    }

    #[test]
    fn test_bytes_accept_integer_arrays() {
        assert_eq!(convert(&Kind::Bytes, &json!([1, 2]), false), Ok(json!([1, 2])));
        assert!(convert(&Kind::Bytes, &json!([256]), false).is_err());
        assert!(convert(&Kind::Bytes, &json!("***"), false).is_err());
        assert!(convert(&Kind::array(Kind::Int), &json!([1, "x"]), false)
            .unwrap_err()
            .starts_with("element 1"));
    }

    #[test]
    fn test_header_relation_schema() {
        let schema = header("`ID` BIGINT KEY, `NAME` STRING")
            .relation_schema("USERS")
            .unwrap();
        assert_eq!(schema.len(), 2);
        assert!(schema.primary().is_some());
    }
}
