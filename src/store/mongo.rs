//! MongoDB live booking store.
//!
//! Documents are read through relaxed extended JSON so that dynamic
//! occasion fields survive untouched. Legacy documents may carry a
//! gzip-compressed copy of the booking in `compressedData`; it is inflated
//! and merged under the top-level fields.

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use flate2::read::GzDecoder;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc, oid::ObjectId};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::booking::{Booking, BookingStatus, PendingArchive};

use super::booking::BookingStore;
use super::error::{StorageError, StorageResult};

const COMPRESSED_FIELD: &str = "compressedData";

const BOOKING_ID_INDEX: &str = "bookingId_unique";

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Unique index on `bookingId`.
///
/// Partial, so legacy documents that only carry the ID inside
/// `compressedData` do not collide on a missing key.
fn booking_id_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "bookingId": 1 })
        .options(
            IndexOptions::builder()
                .name(BOOKING_ID_INDEX.to_string())
                .unique(true)
                .partial_filter_expression(doc! { "bookingId": { "$type": "string" } })
                .build(),
        )
        .build()
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

/// Live booking store over a MongoDB collection.
#[derive(Clone)]
pub struct MongoBookingStore {
    client: Client,
    database: String,
    collection: Collection<Document>,
    /// `_id` of every document read so far, by booking ID.
    keys: Arc<DashMap<String, Bson>>,
    indexed: Arc<OnceCell<()>>,
}

impl MongoBookingStore {
    /// Create a store for `database.collection`.
    ///
    /// The driver connects lazily; use [`BookingStore::ping`] to verify.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> StorageResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let collection = client.database(database).collection::<Document>(collection);
        Ok(Self {
            client,
            database: database.to_string(),
            collection,
            keys: Arc::new(DashMap::new()),
            indexed: Arc::new(OnceCell::new()),
        })
    }

    /// Create the unique `bookingId` index if it is missing.
    ///
    /// Runs once per store; a failed attempt is retried on the next call.
    pub async fn ensure_indexes(&self) -> StorageResult<()> {
        self.indexed
            .get_or_try_init(|| async {
                self.collection.create_index(booking_id_index()).await?;
                debug!(index = BOOKING_ID_INDEX, "Live store index ready");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    /// Filter matching a booking by ID, by remembered `_id`, or by `_id`
    /// when the ID is an ObjectId hex string.
    fn id_filter(&self, id: &str) -> Document {
        let mut any = vec![doc! { "bookingId": id }];
        if let Some(key) = self.keys.get(id) {
            any.push(doc! { "_id": key.value().clone() });
        } else if let Ok(oid) = ObjectId::parse_str(id) {
            any.push(doc! { "_id": oid });
        }
        doc! { "$or": any }
    }

    async fn find_many(&self, filter: Document) -> StorageResult<Vec<Booking>> {
        let mut cursor = self.collection.find(filter).await?;
        let mut bookings = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            match self.read_document(document) {
                Ok(booking) => bookings.push(booking),
                Err(e) => warn!(error = %e, "Skipping unreadable booking document"),
            }
        }
        Ok(bookings)
    }

    fn read_document(&self, document: Document) -> StorageResult<Booking> {
        let key = document.get("_id").cloned();
        let booking = booking_from_document(document)?;
        if let Some(key) = key {
            self.keys.insert(booking.id.clone(), key);
        }
        Ok(booking)
    }
}

// ============================================================================
// Document conversion
// ============================================================================

/// Convert a stored document into a booking.
///
/// Identifier order: top-level `bookingId`, then the compressed payload's,
/// then the document `_id`.
fn booking_from_document(mut document: Document) -> StorageResult<Booking> {
    let object_id = document.remove("_id");
    let compressed = document.remove(COMPRESSED_FIELD);

    let mut fields = match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    fields.retain(|_, v| !v.is_null());

    if let Some(compressed) = compressed {
        match inflate(&compressed) {
            Some(Value::Object(inner)) => {
                for (key, value) in inner {
                    if key != "_id" && !value.is_null() {
                        fields.entry(key).or_insert(value);
                    }
                }
            }
            _ => debug!("compressedData could not be inflated, using top-level fields"),
        }
    }

    for value in fields.values_mut() {
        unwrap_extended(value);
    }

    if !fields.contains_key("bookingId") {
        let fallback = match object_id {
            Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
            Some(Bson::String(s)) => Some(s),
            _ => None,
        };
        match fallback {
            Some(id) => {
                fields.insert("bookingId".to_string(), Value::String(id));
            }
            None => return Err(StorageError::serialization("booking document has no identifier")),
        }
    }
    fields
        .entry("status")
        .or_insert_with(|| Value::from(BookingStatus::Unknown.as_str()));

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| StorageError::serialization(format!("booking document: {e}")))
}

/// Convert a booking into the document written on insert/update.
fn document_from_booking(booking: &Booking) -> StorageResult<Document> {
    bson::to_document(booking).map_err(|e| StorageError::serialization(e.to_string()))
}

/// Gunzip `compressedData` (binary, or base64 text) into JSON.
fn inflate(data: &Bson) -> Option<Value> {
    let bytes = match data {
        Bson::Binary(binary) => binary.bytes.clone(),
        Bson::String(text) => match STANDARD.decode(text.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return serde_json::from_str(text).ok(),
        },
        _ => return None,
    };

    let mut json = String::new();
    match GzDecoder::new(bytes.as_slice()).read_to_string(&mut json) {
        Ok(_) => serde_json::from_str(&json).ok(),
        Err(_) => serde_json::from_slice(&bytes).ok(),
    }
}

/// Replace extended-JSON wrappers (`$date`, `$oid`, `$numberLong`, ...)
/// with plain values.
fn unwrap_extended(value: &mut Value) {
    if let Some(plain) = extended_scalar(value) {
        *value = plain;
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(unwrap_extended),
        Value::Array(items) => items.iter_mut().for_each(unwrap_extended),
        _ => {}
    }
}

fn extended_scalar(value: &Value) -> Option<Value> {
    let Value::Object(map) = value else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    match key.as_str() {
        "$oid" => inner.as_str().map(Value::from),
        "$numberLong" => inner.as_str()?.parse::<i64>().ok().map(Value::from),
        "$numberDecimal" | "$numberDouble" => inner.as_str()?.parse::<f64>().ok().map(Value::from),
        "$date" => date_value(inner),
        _ => None,
    }
}

/// `$date` payload as an RFC 3339 string.
fn date_value(inner: &Value) -> Option<Value> {
    let millis = match inner {
        Value::String(s) => return Some(Value::String(s.clone())),
        Value::Object(map) => map.get("$numberLong")?.as_str()?.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    let at = chrono::DateTime::from_timestamp_millis(millis)?;
    Some(Value::String(at.to_rfc3339()))
}

// ============================================================================
// BookingStore
// ============================================================================

#[async_trait]
impl BookingStore for MongoBookingStore {
    async fn ping(&self) -> StorageResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<Booking>> {
        self.find_many(doc! {}).await
    }

    async fn list_by_status(&self, statuses: &[BookingStatus]) -> StorageResult<Vec<Booking>> {
        let mut names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        if statuses.contains(&BookingStatus::Cancelled) {
            names.push("canceled");
        }
        let pattern = format!(r"^\s*({})\s*$", names.join("|"));
        let bookings = self
            .find_many(doc! { "status": { "$regex": pattern, "$options": "i" } })
            .await?;
        // The parsed status has the final say.
        Ok(bookings
            .into_iter()
            .filter(|b| statuses.contains(&b.status))
            .collect())
    }

    async fn list_pending_archive(&self) -> StorageResult<Vec<Booking>> {
        self.find_many(doc! { "pendingArchive": { "$exists": true, "$ne": Bson::Null } })
            .await
    }

    async fn load(&self, id: &str) -> StorageResult<Option<Booking>> {
        match self.collection.find_one(self.id_filter(id)).await? {
            Some(document) => self.read_document(document).map(Some),
            None => Ok(None),
        }
    }

    async fn insert(&self, booking: &Booking) -> StorageResult<()> {
        if let Err(e) = self.ensure_indexes().await {
            warn!(error = %e, "Unique bookingId index unavailable");
        }
        // Also catches legacy documents the index does not cover.
        if self.collection.find_one(self.id_filter(&booking.id)).await?.is_some() {
            return Err(StorageError::conflict("booking", &booking.id));
        }
        let result = match self
            .collection
            .insert_one(document_from_booking(booking)?)
            .await
        {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(StorageError::conflict("booking", &booking.id));
            }
            Err(e) => return Err(e.into()),
        };
        self.keys.insert(booking.id.clone(), result.inserted_id);
        Ok(())
    }

    async fn save(&self, booking: &Booking) -> StorageResult<()> {
        let mut fields = document_from_booking(booking)?;
        fields.remove("_id");
        let result = self
            .collection
            .update_one(self.id_filter(&booking.id), doc! { "$set": fields })
            .await?;
        if result.matched_count == 0 {
            return Err(StorageError::not_found("booking", &booking.id));
        }
        Ok(())
    }

    async fn mark_pending_archive(&self, id: &str, marker: &PendingArchive) -> StorageResult<()> {
        let marker = bson::to_bson(marker).map_err(|e| StorageError::serialization(e.to_string()))?;
        let result = self
            .collection
            .update_one(self.id_filter(id), doc! { "$set": { "pendingArchive": marker } })
            .await?;
        if result.matched_count == 0 {
            return Err(StorageError::not_found("booking", id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let result = self.collection.delete_one(self.id_filter(id)).await?;
        if result.deleted_count > 0 {
            self.keys.remove(id);
        }
        Ok(result.deleted_count > 0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mongodb::bson::Binary;
    use mongodb::bson::spec::BinarySubtype;
    use serde_json::json;
    use std::io::Write;

    fn gzip(value: &Value) -> Bson {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(value.to_string().as_bytes()).unwrap();
        Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: encoder.finish().unwrap(),
        })
    }

    #[test]
    fn compressed_payload_is_merged_under_top_level() {
        let payload = json!({
            "bookingId": "BK-inner",
            "name": "Inner Name",
            "theaterName": "EROS (COUPLES)",
            "date": "Friday, October 31, 2025",
            "time": "7:00 PM - 9:00 PM",
            "Partner Name": "Ravi"
        });
        let document = doc! {
            "_id": ObjectId::new(),
            "name": "Top Name",
            "status": "Confirmed",
            "compressedData": gzip(&payload),
        };

        let booking = booking_from_document(document).unwrap();
        assert_eq!(booking.id, "BK-inner");
        assert_eq!(booking.name, "Top Name");
        assert_eq!(booking.theater_name, "EROS (COUPLES)");
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.extra["Partner Name"], "Ravi");
        assert!(!booking.extra.contains_key(COMPRESSED_FIELD));
    }

    #[test]
    fn top_level_booking_id_wins() {
        let document = doc! {
            "bookingId": "BK-top",
            "status": "manual",
            "compressedData": gzip(&json!({"bookingId": "BK-inner"})),
        };
        assert_eq!(booking_from_document(document).unwrap().id, "BK-top");
    }

    #[test]
    fn object_id_is_the_last_fallback() {
        let oid = ObjectId::new();
        let document = doc! { "_id": oid, "status": "confirmed", "date": "2025-10-31" };
        assert_eq!(booking_from_document(document).unwrap().id, oid.to_hex());
    }

    #[test]
    fn extended_json_wrappers_are_unwrapped() {
        let created = bson::DateTime::from_millis(1_761_926_400_000);
        let document = doc! {
            "bookingId": "BK-1",
            "status": "confirmed",
            "createdAt": created,
            "numberOfPeople": 4_i64,
            "refs": [ObjectId::new()],
        };
        let booking = booking_from_document(document).unwrap();
        assert_eq!(booking.number_of_people, 4);
        assert_eq!(
            booking.created_at.map(|t| t.timestamp_millis()),
            Some(1_761_926_400_000)
        );
        assert!(booking.extra["refs"][0].is_string());
    }

    #[test]
    fn booking_id_index_is_unique_and_skips_legacy_documents() {
        let index = booking_id_index();
        assert_eq!(index.keys, doc! { "bookingId": 1 });
        let options = index.options.unwrap();
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.name.as_deref(), Some(BOOKING_ID_INDEX));
        assert_eq!(
            options.partial_filter_expression,
            Some(doc! { "bookingId": { "$type": "string" } })
        );
    }

    #[test]
    fn service_owned_keys_from_clients_never_reach_the_document() {
        use crate::booking::{ExpiryPolicy, NewBooking};
        use chrono::Utc;

        let input: NewBooking = serde_json::from_value(json!({
            "name": "Asha",
            "email": "asha@example.com",
            "theaterName": "EROS (COUPLES)",
            "date": "2030-12-31",
            "time": "7:00 PM - 9:00 PM",
            "expiredAt": "2000-01-01T00:00:00Z",
            "pendingArchive": {
                "kind": "cancelled",
                "markedAt": "2000-01-01T00:00:00Z",
                "effectiveAt": "2000-01-01T00:00:00Z"
            }
        }))
        .unwrap();
        let policy = ExpiryPolicy::default();
        let now = Utc::now();
        let booking = input.validate(&policy, now).unwrap();

        let document = document_from_booking(&booking).unwrap();
        assert!(!document.contains_key("expiredAt"));
        assert!(!document.contains_key("pendingArchive"));

        let stored = booking_from_document(document).unwrap();
        assert!(stored.expired_at.is_none());
        assert!(stored.pending_archive.is_none());
        assert!(!policy.check(&stored, now).is_expired());
    }

    #[test]
    fn missing_status_reads_as_unknown() {
        let document = doc! { "bookingId": "BK-1" };
        assert_eq!(
            booking_from_document(document).unwrap().status,
            BookingStatus::Unknown
        );
    }
}
