//! MySQL archive store.
//!
//! Two tables, `completed_bookings` and `cancelled_bookings`, each keyed
//! uniquely by `booking_id`. Writes use `ON DUPLICATE KEY UPDATE`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::FromRow;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::archive::{ArchiveStats, ArchiveSummary, CancelledRecord, CompletedRecord, TableStats};

use super::archive::ArchiveStore;
use super::error::StorageResult;

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const CREATE_COMPLETED: &str = r#"
CREATE TABLE IF NOT EXISTS completed_bookings (
    id INT AUTO_INCREMENT PRIMARY KEY,
    booking_id VARCHAR(255) UNIQUE NOT NULL,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    phone VARCHAR(20),
    theater_name VARCHAR(255),
    booking_date DATE,
    booking_time VARCHAR(50),
    occasion VARCHAR(255),
    number_of_people INT,
    total_amount DECIMAL(10,2),
    completed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    booking_status VARCHAR(50) DEFAULT 'completed',
    payment_status VARCHAR(50),
    original_booking_data LONGTEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    INDEX idx_booking_id (booking_id),
    INDEX idx_email (email),
    INDEX idx_booking_date (booking_date),
    INDEX idx_completed_at (completed_at)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
"#;

const CREATE_CANCELLED: &str = r#"
CREATE TABLE IF NOT EXISTS cancelled_bookings (
    id INT AUTO_INCREMENT PRIMARY KEY,
    booking_id VARCHAR(255) UNIQUE NOT NULL,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    phone VARCHAR(20),
    theater_name VARCHAR(255),
    booking_date DATE,
    booking_time VARCHAR(50),
    occasion VARCHAR(255),
    number_of_people INT,
    total_amount DECIMAL(10,2),
    cancelled_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    cancellation_reason TEXT,
    refund_amount DECIMAL(10,2),
    refund_status VARCHAR(50),
    original_booking_data LONGTEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    INDEX idx_booking_id (booking_id),
    INDEX idx_email (email),
    INDEX idx_booking_date (booking_date),
    INDEX idx_cancelled_at (cancelled_at)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
"#;

const UPSERT_COMPLETED: &str = r#"
INSERT INTO completed_bookings (
    booking_id, name, email, phone, theater_name, booking_date, booking_time,
    occasion, number_of_people, total_amount, completed_at, booking_status,
    payment_status, original_booking_data
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    name = VALUES(name),
    email = VALUES(email),
    phone = VALUES(phone),
    theater_name = VALUES(theater_name),
    booking_date = VALUES(booking_date),
    booking_time = VALUES(booking_time),
    occasion = VALUES(occasion),
    number_of_people = VALUES(number_of_people),
    total_amount = VALUES(total_amount),
    completed_at = VALUES(completed_at),
    booking_status = VALUES(booking_status),
    payment_status = VALUES(payment_status),
    original_booking_data = VALUES(original_booking_data),
    updated_at = CURRENT_TIMESTAMP
"#;

const UPSERT_CANCELLED: &str = r#"
INSERT INTO cancelled_bookings (
    booking_id, name, email, phone, theater_name, booking_date, booking_time,
    occasion, number_of_people, total_amount, cancelled_at, cancellation_reason,
    refund_amount, refund_status, original_booking_data
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    name = VALUES(name),
    email = VALUES(email),
    phone = VALUES(phone),
    theater_name = VALUES(theater_name),
    booking_date = VALUES(booking_date),
    booking_time = VALUES(booking_time),
    occasion = VALUES(occasion),
    number_of_people = VALUES(number_of_people),
    total_amount = VALUES(total_amount),
    cancelled_at = VALUES(cancelled_at),
    cancellation_reason = VALUES(cancellation_reason),
    refund_amount = VALUES(refund_amount),
    refund_status = VALUES(refund_status),
    original_booking_data = VALUES(original_booking_data),
    updated_at = CURRENT_TIMESTAMP
"#;

const SUMMARY_COLUMNS: &str = "booking_id, name, email, phone, theater_name, booking_date, \
     booking_time, occasion, number_of_people, total_amount, \
     CAST(original_booking_data AS CHAR) AS original_booking_data";

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct SummaryRow {
    booking_id: String,
    name: String,
    email: String,
    phone: Option<String>,
    theater_name: Option<String>,
    booking_date: Option<NaiveDate>,
    booking_time: Option<String>,
    occasion: Option<String>,
    number_of_people: Option<i32>,
    total_amount: Option<Decimal>,
    original_booking_data: Option<String>,
}

impl SummaryRow {
    fn into_parts(self) -> (ArchiveSummary, String) {
        let summary = ArchiveSummary {
            booking_id: self.booking_id,
            name: self.name,
            email: self.email,
            phone: self.phone.unwrap_or_default(),
            theater_name: self.theater_name.unwrap_or_default(),
            booking_date: self.booking_date,
            booking_time: self.booking_time.unwrap_or_default(),
            occasion: self.occasion.unwrap_or_default(),
            number_of_people: self
                .number_of_people
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or_default(),
            total_amount: amount(self.total_amount).unwrap_or_default(),
        };
        (summary, self.original_booking_data.unwrap_or_default())
    }
}

#[derive(Debug, FromRow)]
struct CompletedRow {
    #[sqlx(flatten)]
    summary: SummaryRow,
    completed_at: DateTime<Utc>,
    booking_status: Option<String>,
    payment_status: Option<String>,
}

#[derive(Debug, FromRow)]
struct CancelledRow {
    #[sqlx(flatten)]
    summary: SummaryRow,
    cancelled_at: DateTime<Utc>,
    cancellation_reason: Option<String>,
    refund_amount: Option<Decimal>,
    refund_status: Option<String>,
}

/// `DECIMAL(10,2)` column value as a JSON-friendly amount.
fn amount(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|d| d.to_f64())
}

/// `+HH:MM` offset of `timezone` at `now`, for `CONVERT_TZ`.
fn utc_offset(timezone: Tz, now: DateTime<Utc>) -> String {
    let seconds = timezone
        .offset_from_utc_datetime(&now.naive_utc())
        .fix()
        .local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}

// ============================================================================
// Store
// ============================================================================

/// Archive store over a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlArchiveStore {
    pool: MySqlPool,
}

impl MySqlArchiveStore {
    /// Build a lazily-connecting pool.
    pub fn new(options: MySqlConnectOptions, max_connections: u32) -> Self {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect_lazy_with(options);
        Self { pool }
    }

    async fn table_stats(
        &self,
        table: &str,
        column: &str,
        offset: &str,
        today: NaiveDate,
    ) -> StorageResult<TableStats> {
        let local = format!("CONVERT_TZ({column}, '+00:00', '{offset}')");
        let sql = format!(
            "SELECT \
                COUNT(*), \
                COUNT(CASE WHEN DATE({local}) = ? THEN 1 END), \
                COUNT(CASE WHEN YEARWEEK({local}, 1) = YEARWEEK(?, 1) THEN 1 END), \
                COUNT(CASE WHEN YEAR({local}) = YEAR(?) AND MONTH({local}) = MONTH(?) THEN 1 END), \
                COUNT(CASE WHEN YEAR({local}) = YEAR(?) THEN 1 END) \
             FROM {table}"
        );
        let (total, day, week, month, year): (i64, i64, i64, i64, i64) = sqlx::query_as(&sql)
            .bind(today)
            .bind(today)
            .bind(today)
            .bind(today)
            .bind(today)
            .fetch_one(&self.pool)
            .await?;
        Ok(TableStats {
            total,
            today: day,
            this_week: week,
            this_month: month,
            this_year: year,
        })
    }
}

#[async_trait]
impl ArchiveStore for MySqlArchiveStore {
    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(CREATE_CANCELLED).execute(&self.pool).await?;
        sqlx::query(CREATE_COMPLETED).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_completed(&self, record: &CompletedRecord) -> StorageResult<()> {
        let s = &record.summary;
        sqlx::query(UPSERT_COMPLETED)
            .bind(&s.booking_id)
            .bind(&s.name)
            .bind(&s.email)
            .bind(&s.phone)
            .bind(&s.theater_name)
            .bind(s.booking_date)
            .bind(&s.booking_time)
            .bind(&s.occasion)
            .bind(s.number_of_people)
            .bind(s.total_amount)
            .bind(record.completed_at)
            .bind(&record.booking_status)
            .bind(&record.payment_status)
            .bind(&record.snapshot)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_cancelled(&self, record: &CancelledRecord) -> StorageResult<()> {
        let s = &record.summary;
        sqlx::query(UPSERT_CANCELLED)
            .bind(&s.booking_id)
            .bind(&s.name)
            .bind(&s.email)
            .bind(&s.phone)
            .bind(&s.theater_name)
            .bind(s.booking_date)
            .bind(&s.booking_time)
            .bind(&s.occasion)
            .bind(s.number_of_people)
            .bind(s.total_amount)
            .bind(record.cancelled_at)
            .bind(&record.cancellation_reason)
            .bind(record.refund_amount)
            .bind(&record.refund_status)
            .bind(&record.snapshot)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_completed(&self) -> StorageResult<Vec<CompletedRecord>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS}, completed_at, booking_status, payment_status \
             FROM completed_bookings ORDER BY completed_at DESC"
        );
        let rows: Vec<CompletedRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (summary, snapshot) = row.summary.into_parts();
                CompletedRecord {
                    summary,
                    completed_at: row.completed_at,
                    booking_status: row.booking_status.unwrap_or_else(|| "completed".to_string()),
                    payment_status: row.payment_status.unwrap_or_default(),
                    snapshot,
                }
            })
            .collect())
    }

    async fn list_cancelled(&self) -> StorageResult<Vec<CancelledRecord>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS}, cancelled_at, cancellation_reason, \
             refund_amount, refund_status \
             FROM cancelled_bookings ORDER BY cancelled_at DESC"
        );
        let rows: Vec<CancelledRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (summary, snapshot) = row.summary.into_parts();
                CancelledRecord {
                    summary,
                    cancelled_at: row.cancelled_at,
                    cancellation_reason: row.cancellation_reason,
                    refund_amount: amount(row.refund_amount),
                    refund_status: row.refund_status,
                    snapshot,
                }
            })
            .collect())
    }

    async fn stats(&self, now: DateTime<Utc>, timezone: Tz) -> StorageResult<ArchiveStats> {
        let offset = utc_offset(timezone, now);
        let today = now.with_timezone(&timezone).date_naive();
        Ok(ArchiveStats {
            completed: self
                .table_stats("completed_bookings", "completed_at", &offset, today)
                .await?,
            cancelled: self
                .table_stats("cancelled_bookings", "cancelled_at", &offset, today)
                .await?,
        })
    }
}
