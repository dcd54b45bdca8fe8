use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Executor, Pool, Postgres, Row,
};
use uuid::Uuid;

use super::{Store, Transaction};
use crate::entities::{
    Customer, Driver, DriverOffer, DriverStatus, Payment, RequestStatus, ServiceRequest,
};
use crate::error::{invalid_state_error, not_found_error, Error};

type Database = Postgres;

const REQUEST_COLUMNS: &str = "id, customer_id, pickup, dropoff, vehicle_type, note, status, chosen_offer_id, payment_id, requested_at, booked_at";
const OFFER_COLUMNS: &str = "id, request_id, driver_id, price, status, created_at";
const PAYMENT_COLUMNS: &str = "id, customer_id, payment_method_id, amount, status, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::connect", skip(db_uri))]
    pub async fn connect(
        db_uri: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(db_uri)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Database>) -> Result<Self, Error> {
        let mut tx = pool.begin().await?;

        // serializes schema creation across processes starting at the same time
        tx.execute("SELECT pg_advisory_xact_lock(7370)").await?;

        tx.execute("CREATE TABLE IF NOT EXISTS customers (id UUID PRIMARY KEY, name VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL)")
            .await?;
        tx.execute("CREATE TABLE IF NOT EXISTS drivers (id UUID PRIMARY KEY, name VARCHAR NOT NULL, status VARCHAR NOT NULL)")
            .await?;
        tx.execute("CREATE TABLE IF NOT EXISTS payments (id UUID PRIMARY KEY, customer_id UUID NOT NULL, payment_method_id INT8 NOT NULL, amount INT8 NOT NULL, status VARCHAR NOT NULL, updated_at TIMESTAMPTZ NOT NULL, CONSTRAINT uq_payment_customer_method UNIQUE (customer_id, payment_method_id), CONSTRAINT fk_payment_customer FOREIGN KEY(customer_id) REFERENCES customers(id))")
            .await?;
        tx.execute("CREATE TABLE IF NOT EXISTS service_requests (id UUID PRIMARY KEY, customer_id UUID NOT NULL, pickup JSONB NOT NULL, dropoff JSONB NOT NULL, vehicle_type VARCHAR NOT NULL, note TEXT, status VARCHAR NOT NULL, chosen_offer_id UUID, payment_id UUID, requested_at TIMESTAMPTZ NOT NULL, booked_at TIMESTAMPTZ, CONSTRAINT fk_request_customer FOREIGN KEY(customer_id) REFERENCES customers(id), CONSTRAINT fk_request_payment FOREIGN KEY(payment_id) REFERENCES payments(id))")
            .await?;
        tx.execute("CREATE TABLE IF NOT EXISTS driver_offers (id UUID PRIMARY KEY, request_id UUID NOT NULL, driver_id UUID NOT NULL, price INT8 NOT NULL, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, CONSTRAINT fk_offer_request FOREIGN KEY(request_id) REFERENCES service_requests(id), CONSTRAINT fk_offer_driver FOREIGN KEY(driver_id) REFERENCES drivers(id))")
            .await?;
        tx.execute("CREATE INDEX IF NOT EXISTS idx_driver_offers_request ON driver_offers (request_id, status)")
            .await?;
        tx.execute("CREATE INDEX IF NOT EXISTS idx_driver_offers_driver ON driver_offers (driver_id, status)")
            .await?;

        tx.commit().await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, Error> {
        let tx = self.pool.begin().await?;

        Ok(Box::new(PgTransaction { tx }))
    }

    #[tracing::instrument(skip(self))]
    async fn insert_customer(&self, customer: &Customer) -> Result<(), Error> {
        sqlx::query("INSERT INTO customers (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(&customer.id)
            .bind(&customer.name)
            .bind(&customer.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, Error> {
        let maybe_row = sqlx::query("SELECT id, name, created_at FROM customers WHERE id = $1")
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?;

        match maybe_row {
            Some(row) => Ok(Some(Customer {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn insert_driver(&self, driver: &Driver) -> Result<(), Error> {
        sqlx::query("INSERT INTO drivers (id, name, status) VALUES ($1, $2, $3)")
            .bind(&driver.id)
            .bind(&driver.name)
            .bind(driver.status.name())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, Error> {
        let maybe_row = sqlx::query("SELECT id, name, status FROM drivers WHERE id = $1")
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?;

        match maybe_row {
            Some(row) => {
                let status: String = row.try_get("status")?;

                Ok(Some(Driver {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    status: status.parse()?,
                }))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn set_driver_status(
        &self,
        id: Uuid,
        from: DriverStatus,
        to: DriverStatus,
    ) -> Result<u64, Error> {
        let result = sqlx::query("UPDATE drivers SET status = $3 WHERE id = $1 AND status = $2")
            .bind(&id)
            .bind(from.name())
            .bind(to.name())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, request), fields(request_id = %request.id))]
    async fn insert_request(&self, request: &ServiceRequest) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO service_requests (id, customer_id, pickup, dropoff, vehicle_type, note, status, chosen_offer_id, payment_id, requested_at, booked_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&request.id)
        .bind(&request.customer_id)
        .bind(Json(&request.pickup))
        .bind(Json(&request.dropoff))
        .bind(&request.vehicle_type)
        .bind(&request.note)
        .bind(request.status.name())
        .bind(&request.chosen_offer_id)
        .bind(&request.payment_id)
        .bind(&request.requested_at)
        .bind(&request.booked_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            // foreign_key_violation: the customer row is missing
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.code().as_deref() == Some("23503") {
                    return not_found_error("customer not found");
                }
            }
            Error::from(err)
        })?;

        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, Error> {
        let maybe_row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests WHERE id = $1"
        ))
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?;

        maybe_row.as_ref().map(request_from_row).transpose()
    }

    async fn list_requests(&self, customer_id: Uuid) -> Result<Vec<ServiceRequest>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_requests WHERE customer_id = $1 ORDER BY requested_at DESC"
        ))
        .bind(&customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn complete_request(&self, id: Uuid) -> Result<u64, Error> {
        let result =
            sqlx::query("UPDATE service_requests SET status = $2 WHERE id = $1 AND status = $3")
                .bind(&id)
                .bind(RequestStatus::Completed.name())
                .bind(RequestStatus::Accepted.name())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_request(&self, id: Uuid) -> Result<u64, Error> {
        let mut tx = self.pool.begin().await?;

        let result = tx
            .execute(
                sqlx::query("UPDATE service_requests SET status = 'cancelled', chosen_offer_id = NULL, payment_id = NULL WHERE id = $1 AND status IN ('pending', 'accepted')")
                    .bind(&id),
            )
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        let swept = tx
            .execute(
                sqlx::query("UPDATE driver_offers SET status = 'rejected' WHERE request_id = $1 AND status IN ('pending', 'accepted')")
                    .bind(&id),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(swept = swept.rows_affected(), "request cancelled");

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, offer), fields(offer_id = %offer.id))]
    async fn insert_offer(&self, offer: &DriverOffer) -> Result<u64, Error> {
        let mut tx = self.pool.begin().await?;

        // share-lock the request so a concurrent accept or cancel either finishes first
        // or waits for this offer to land before sweeping
        let maybe_status: Option<String> = tx
            .fetch_optional(
                sqlx::query("SELECT status FROM service_requests WHERE id = $1 FOR SHARE")
                    .bind(&offer.request_id),
            )
            .await?
            .map(|row| row.try_get("status"))
            .transpose()?;

        if maybe_status.as_deref() != Some(RequestStatus::Pending.name()) {
            tx.rollback().await?;
            return Ok(0);
        }

        // a concurrent stop_driver blocks on this lock, so its sweep sees the offer
        let driver_status: Option<String> = tx
            .fetch_optional(
                sqlx::query("SELECT status FROM drivers WHERE id = $1 FOR SHARE")
                    .bind(&offer.driver_id),
            )
            .await?
            .map(|row| row.try_get("status"))
            .transpose()?;

        match driver_status.as_deref() {
            Some(status) if status == DriverStatus::Available.name() => {}
            Some(_) => {
                tx.rollback().await?;
                return Err(invalid_state_error("driver is not available"));
            }
            None => {
                tx.rollback().await?;
                return Err(not_found_error("driver not found"));
            }
        }

        let result = tx
            .execute(
                sqlx::query(
                    "INSERT INTO driver_offers (id, request_id, driver_id, price, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&offer.id)
                .bind(&offer.request_id)
                .bind(&offer.driver_id)
                .bind(offer.price)
                .bind(offer.status.name())
                .bind(&offer.created_at),
            )
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn find_offer(&self, id: Uuid) -> Result<Option<DriverOffer>, Error> {
        let maybe_row = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM driver_offers WHERE id = $1"
        ))
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?;

        maybe_row.as_ref().map(offer_from_row).transpose()
    }

    async fn list_offers(&self, request_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM driver_offers WHERE request_id = $1 ORDER BY created_at ASC"
        ))
        .bind(&request_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(offer_from_row).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_offer(&self, id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE driver_offers SET status = 'rejected' WHERE id = $1 AND status = 'pending'",
        )
        .bind(&id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_all_offers(&self, driver_id: Uuid) -> Result<Vec<DriverOffer>, Error> {
        let rows = sqlx::query(&format!(
            "UPDATE driver_offers SET status = 'rejected' WHERE driver_id = $1 AND status = 'pending' RETURNING {OFFER_COLUMNS}"
        ))
        .bind(&driver_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(offer_from_row).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn reject_competing_offers(
        &self,
        request_id: Uuid,
        driver_id: Uuid,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE driver_offers o SET status = 'rejected' FROM service_requests r WHERE r.id = o.request_id AND o.request_id = $1 AND o.driver_id <> $2 AND o.status = 'pending' AND r.status IN ('accepted', 'completed')",
        )
        .bind(&request_id)
        .bind(&driver_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, Error> {
        let maybe_row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?;

        maybe_row.as_ref().map(payment_from_row).transpose()
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Database>,
}

#[async_trait]
impl Transaction for PgTransaction {
    #[tracing::instrument(skip(self))]
    async fn accept_request(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error> {
        let result = self
            .tx
            .execute(
                sqlx::query("UPDATE service_requests SET status = 'accepted', chosen_offer_id = $3, booked_at = $4 WHERE id = $1 AND customer_id = $2 AND status = 'pending'")
                    .bind(&request_id)
                    .bind(&customer_id)
                    .bind(&offer_id)
                    .bind(Utc::now()),
            )
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn upsert_payment(
        &mut self,
        customer_id: Uuid,
        payment_method_id: i64,
        amount: i64,
    ) -> Result<Uuid, Error> {
        let payment = Payment::new(customer_id, payment_method_id, amount);

        let row = self
            .tx
            .fetch_one(
                sqlx::query("INSERT INTO payments (id, customer_id, payment_method_id, amount, status, updated_at) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (customer_id, payment_method_id) DO UPDATE SET amount = EXCLUDED.amount, status = EXCLUDED.status, updated_at = EXCLUDED.updated_at RETURNING id")
                    .bind(&payment.id)
                    .bind(&payment.customer_id)
                    .bind(payment.payment_method_id)
                    .bind(payment.amount)
                    .bind(payment.status.name())
                    .bind(&payment.updated_at),
            )
            .await?;

        Ok(row.try_get("id")?)
    }

    #[tracing::instrument(skip(self))]
    async fn attach_payment(
        &mut self,
        request_id: Uuid,
        customer_id: Uuid,
        payment_id: Uuid,
    ) -> Result<u64, Error> {
        let result = self
            .tx
            .execute(
                sqlx::query(
                    "UPDATE service_requests SET payment_id = $3 WHERE id = $1 AND customer_id = $2",
                )
                .bind(&request_id)
                .bind(&customer_id)
                .bind(&payment_id),
            )
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn accept_offer(
        &mut self,
        offer_id: Uuid,
        request_id: Uuid,
        price: i64,
    ) -> Result<u64, Error> {
        let result = self
            .tx
            .execute(
                sqlx::query("UPDATE driver_offers SET status = 'accepted', price = $3 WHERE id = $1 AND request_id = $2 AND status = 'pending'")
                    .bind(&offer_id)
                    .bind(&request_id)
                    .bind(price),
            )
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn reject_other_offers(
        &mut self,
        request_id: Uuid,
        offer_id: Uuid,
    ) -> Result<u64, Error> {
        let result = self
            .tx
            .execute(
                sqlx::query("UPDATE driver_offers SET status = 'rejected' WHERE request_id = $1 AND id <> $2 AND status = 'pending'")
                    .bind(&request_id)
                    .bind(&offer_id),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        let PgTransaction { tx } = *self;
        tx.rollback().await?;

        Ok(())
    }
}

fn request_from_row(row: &PgRow) -> Result<ServiceRequest, Error> {
    let Json(pickup) = row.try_get("pickup")?;
    let Json(dropoff) = row.try_get("dropoff")?;
    let status: String = row.try_get("status")?;

    Ok(ServiceRequest {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        pickup,
        dropoff,
        vehicle_type: row.try_get("vehicle_type")?,
        note: row.try_get("note")?,
        status: status.parse()?,
        chosen_offer_id: row.try_get("chosen_offer_id")?,
        payment_id: row.try_get("payment_id")?,
        requested_at: row.try_get("requested_at")?,
        booked_at: row.try_get("booked_at")?,
    })
}

fn offer_from_row(row: &PgRow) -> Result<DriverOffer, Error> {
    let status: String = row.try_get("status")?;

    Ok(DriverOffer {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        driver_id: row.try_get("driver_id")?,
        price: row.try_get("price")?,
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, Error> {
    let status: String = row.try_get("status")?;

    Ok(Payment {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        payment_method_id: row.try_get("payment_method_id")?,
        amount: row.try_get("amount")?,
        status: status.parse()?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[test]
#[ignore = "requires a running postgres reachable through DATABASE_URL"]
fn connect_creates_schema() {
    use tokio_test::block_on;

    let uri = std::env::var("DATABASE_URL").unwrap();
    let store = block_on(PgStore::connect(&uri, 2, Duration::from_secs(5))).unwrap();

    let customer = Customer::new("Schema check".into()).unwrap();
    block_on(store.insert_customer(&customer)).unwrap();
    let found = block_on(store.find_customer(customer.id)).unwrap();

    assert_eq!(found.map(|c| c.id), Some(customer.id));
}
