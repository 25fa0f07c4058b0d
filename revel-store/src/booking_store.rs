//! Postgres implementation of the booking store.
//!
//! `PgStoreTx` wraps one sqlx transaction; dropping it without commit rolls
//! back, which is what the confirmation and refund flows lean on. The
//! conditional-decrement UPDATE in `reserve_availability` is what keeps a
//! pool from going negative no matter how many confirmations race.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use revel_booking::{
    Booking, BookingFilter, BookingItem, BookingStatus, BookingStore, BookingWithItems,
    NewEmailQueueEntry, StoreError, StoreTx,
};
use revel_catalog::{AvailabilityEntry, Extra, ItemKey, ItemType, Package, ReserveOutcome};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn bad_row(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("bad row: {err}"))
}

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_reference: Option<String>,
    status: String,
    booking_date: NaiveDate,
    total_minor: i64,
    discount_minor: i64,
    final_minor: i64,
    currency: String,
    user_id: Option<Uuid>,
    guest_name: Option<String>,
    guest_email: Option<String>,
    payment_reference: Option<String>,
    refunded_minor: Option<i64>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = self.status.parse::<BookingStatus>().map_err(bad_row)?;
        Ok(Booking {
            id: self.id,
            booking_reference: self.booking_reference,
            status,
            booking_date: self.booking_date,
            total_minor: self.total_minor,
            discount_minor: self.discount_minor,
            final_minor: self.final_minor,
            currency: self.currency,
            user_id: self.user_id,
            guest_name: self.guest_name,
            guest_email: self.guest_email,
            payment_reference: self.payment_reference,
            refunded_minor: self.refunded_minor,
            refunded_at: self.refunded_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingItemRow {
    id: Uuid,
    booking_id: Uuid,
    item_type: String,
    item_id: Uuid,
    name: String,
    quantity: i32,
    unit_price_minor: i64,
    total_price_minor: i64,
}

impl BookingItemRow {
    fn into_item(self) -> Result<BookingItem, StoreError> {
        let item_type = self.item_type.parse::<ItemType>().map_err(bad_row)?;
        Ok(BookingItem {
            id: self.id,
            booking_id: self.booking_id,
            item_type,
            item_id: self.item_id,
            name: self.name,
            quantity: self.quantity,
            unit_price_minor: self.unit_price_minor,
            total_price_minor: self.total_price_minor,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AvailabilityRow {
    item_type: String,
    item_id: Uuid,
    availability_date: NaiveDate,
    total_quantity: i32,
    available_quantity: i32,
}

impl AvailabilityRow {
    fn into_entry(self) -> Result<AvailabilityEntry, StoreError> {
        let item_type = self.item_type.parse::<ItemType>().map_err(bad_row)?;
        Ok(AvailabilityEntry {
            item: ItemKey {
                item_type,
                item_id: self.item_id,
            },
            date: self.availability_date,
            total_quantity: self.total_quantity,
            available_quantity: self.available_quantity,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CatalogItemRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price_minor: i64,
    is_active: bool,
    metadata: serde_json::Value,
}

const BOOKING_COLUMNS: &str = "id, booking_reference, status, booking_date, total_minor, \
     discount_minor, final_minor, currency, user_id, guest_name, guest_email, \
     payment_reference, refunded_minor, refunded_at, created_at, updated_at";

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_booking_with_items(
        &self,
        id: Uuid,
    ) -> Result<Option<BookingWithItems>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let booking = row.into_booking()?;

        let item_rows = sqlx::query_as::<_, BookingItemRow>(
            "SELECT id, booking_id, item_type, item_id, name, quantity, unit_price_minor, \
             total_price_minor FROM booking_items WHERE booking_id = $1 ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let items = item_rows
            .into_iter()
            .map(BookingItemRow::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        let owner_email = match booking.user_id {
            Some(user_id) => sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?,
            None => None,
        };

        Ok(Some(BookingWithItems {
            booking,
            items,
            owner_email,
        }))
    }

    async fn create_booking(
        &self,
        booking: &Booking,
        items: &[BookingItem],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO bookings (id, booking_reference, status, booking_date, total_minor, \
             discount_minor, final_minor, currency, user_id, guest_name, guest_email, \
             payment_reference, refunded_minor, refunded_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(booking.id)
        .bind(&booking.booking_reference)
        .bind(booking.status.as_str())
        .bind(booking.booking_date)
        .bind(booking.total_minor)
        .bind(booking.discount_minor)
        .bind(booking.final_minor)
        .bind(&booking.currency)
        .bind(booking.user_id)
        .bind(&booking.guest_name)
        .bind(&booking.guest_email)
        .bind(&booking.payment_reference)
        .bind(booking.refunded_minor)
        .bind(booking.refunded_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for item in items {
            sqlx::query(
                "INSERT INTO booking_items (id, booking_id, item_type, item_id, name, quantity, \
                 unit_price_minor, total_price_minor) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(item.id)
            .bind(item.booking_id)
            .bind(item.item_type.as_str())
            .bind(item.item_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price_minor)
            .bind(item.total_price_minor)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn find_package(&self, id: Uuid) -> Result<Option<Package>, StoreError> {
        let row = sqlx::query_as::<_, CatalogItemRow>(
            "SELECT id, name, description, price_minor, is_active, metadata FROM packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|r| Package {
            id: r.id,
            name: r.name,
            description: r.description,
            price_minor: r.price_minor,
            is_active: r.is_active,
            metadata: r.metadata,
        }))
    }

    async fn find_extra(&self, id: Uuid) -> Result<Option<Extra>, StoreError> {
        let row = sqlx::query_as::<_, CatalogItemRow>(
            "SELECT id, name, description, price_minor, is_active, metadata FROM extras WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|r| Extra {
            id: r.id,
            name: r.name,
            description: r.description,
            price_minor: r.price_minor,
            is_active: r.is_active,
            metadata: r.metadata,
        }))
    }

    async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AvailabilityRow>(
            "SELECT item_type, item_id, availability_date, total_quantity, available_quantity \
             FROM availability WHERE availability_date = $1 ORDER BY item_type, item_id",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(AvailabilityRow::into_entry).collect()
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let status = filter.status.map(|s| s.as_str().to_string());
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ($1::date IS NULL OR booking_date = $1) \
             AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(filter.booking_date)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(Box::new(PgStoreTx { tx }))
    }
}

struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn reference_in_use(&mut self, code: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE booking_reference = $1)",
        )
        .bind(code)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(backend)
    }

    async fn set_booking_confirmed(
        &mut self,
        id: Uuid,
        reference: &str,
        payment_reference: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'CONFIRMED', booking_reference = $2, \
             payment_reference = $3, updated_at = NOW() WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .bind(reference)
        .bind(payment_reference)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "booking {id} not PENDING at confirmation write"
            )));
        }
        Ok(())
    }

    async fn set_booking_cancelled(&mut self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'CANCELLED', updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "booking {id} not PENDING at cancellation write"
            )));
        }
        Ok(())
    }

    async fn set_booking_refunded(
        &mut self,
        id: Uuid,
        amount_minor: i64,
        refunded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'REFUNDED', refunded_minor = $2, refunded_at = $3, \
             updated_at = $3 WHERE id = $1 AND status = 'CONFIRMED'",
        )
        .bind(id)
        .bind(amount_minor)
        .bind(refunded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "booking {id} not CONFIRMED at refund write"
            )));
        }
        Ok(())
    }

    async fn reserve_availability(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<ReserveOutcome, StoreError> {
        if quantity <= 0 {
            return Err(StoreError::Backend(format!(
                "non-positive reserve quantity {quantity}"
            )));
        }

        // The available_quantity >= $4 guard makes the decrement atomic:
        // racing transactions queue on the row lock and the loser sees the
        // already-reduced pool.
        let updated = sqlx::query_scalar::<_, i32>(
            "UPDATE availability SET available_quantity = available_quantity - $4, \
             updated_at = NOW() WHERE item_type = $1 AND item_id = $2 \
             AND availability_date = $3 AND available_quantity >= $4 \
             RETURNING available_quantity",
        )
        .bind(item.item_type.as_str())
        .bind(item.item_id)
        .bind(date)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        if let Some(remaining) = updated {
            return Ok(ReserveOutcome::Reserved { remaining });
        }

        // No row touched: either nothing tracks this item (unconstrained)
        // or the pool is short.
        let available = sqlx::query_scalar::<_, i32>(
            "SELECT available_quantity FROM availability \
             WHERE item_type = $1 AND item_id = $2 AND availability_date = $3",
        )
        .bind(item.item_type.as_str())
        .bind(item.item_id)
        .bind(date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        Ok(match available {
            None => ReserveOutcome::Unconstrained,
            Some(available) => ReserveOutcome::Insufficient { available },
        })
    }

    async fn release_availability(
        &mut self,
        item: &ItemKey,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<Option<i32>, StoreError> {
        if quantity <= 0 {
            return Err(StoreError::Backend(format!(
                "non-positive release quantity {quantity}"
            )));
        }

        sqlx::query_scalar::<_, i32>(
            "UPDATE availability SET available_quantity = \
             LEAST(total_quantity, available_quantity + $4), updated_at = NOW() \
             WHERE item_type = $1 AND item_id = $2 AND availability_date = $3 \
             RETURNING available_quantity",
        )
        .bind(item.item_type.as_str())
        .bind(item.item_id)
        .bind(date)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)
    }

    async fn enqueue_email(&mut self, entry: NewEmailQueueEntry) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO email_queue (id, recipient, email_type, content, scheduled_for, status) \
             VALUES ($1, $2, $3, $4, $5, 'PENDING')",
        )
        .bind(id)
        .bind(&entry.recipient)
        .bind(entry.email_type.as_str())
        .bind(&entry.content)
        .bind(entry.scheduled_for)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(backend)
    }
}
