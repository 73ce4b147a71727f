use crate::models::payments;

use sqlx::PgPool;
use uuid::Uuid;

mod explorer;
mod gateway;
mod psp;

pub use explorer::ExplorerApi;
pub use gateway::GatewayApi;
pub use psp::PspApi;

#[derive(Clone)]
pub struct PaymentRepository {
    conn: PgPool,
}

impl PaymentRepository {
    pub fn new(conn: PgPool) -> Self {
        PaymentRepository { conn }
    }

    pub async fn insert_pix_payment(
        &self,
        document_id: &str,
        amount_in_cents: i64,
        charge_id: &str,
    ) -> Result<payments::Payment, anyhow::Error> {
        let payment_id = Uuid::new_v4().hyphenated().to_string();

        let payment = sqlx::query_as::<_, payments::Payment>(
            r#"INSERT INTO payments
            (id, document_id, method, amount_in_cents, currency, provider_ref, status)
            VALUES ($1, $2, 'pix', $3, 'BRL', $4, 'pending')
            RETURNING *
            "#,
        )
        .bind(&payment_id)
        .bind(document_id)
        .bind(amount_in_cents)
        .bind(charge_id)
        .fetch_one(&self.conn)
        .await?;

        Ok(payment)
    }

    pub async fn insert_crypto_payment(
        &self,
        document_id: &str,
        amount_in_cents: i64,
        token_symbol: &str,
        expected_amount: f64,
    ) -> Result<payments::Payment, anyhow::Error> {
        let payment_id = Uuid::new_v4().hyphenated().to_string();

        let payment = sqlx::query_as::<_, payments::Payment>(
            r#"INSERT INTO payments
            (id, document_id, method, amount_in_cents, currency, token_symbol, expected_amount, status)
            VALUES ($1, $2, 'crypto', $3, 'BRL', $4, $5, 'pending')
            RETURNING *
            "#,
        )
        .bind(&payment_id)
        .bind(document_id)
        .bind(amount_in_cents)
        .bind(token_symbol)
        .bind(expected_amount)
        .fetch_one(&self.conn)
        .await?;

        Ok(payment)
    }

    pub async fn insert_gateway_payment(
        &self,
        document_id: &str,
        amount_in_cents: i64,
        pay_currency: &str,
        invoice_id: &str,
    ) -> Result<payments::Payment, anyhow::Error> {
        let payment_id = Uuid::new_v4().hyphenated().to_string();

        let payment = sqlx::query_as::<_, payments::Payment>(
            r#"INSERT INTO payments
            (id, document_id, method, amount_in_cents, currency, token_symbol, provider_ref, status)
            VALUES ($1, $2, 'crypto', $3, 'BRL', $4, $5, 'pending')
            RETURNING *
            "#,
        )
        .bind(&payment_id)
        .bind(document_id)
        .bind(amount_in_cents)
        .bind(pay_currency)
        .bind(invoice_id)
        .fetch_one(&self.conn)
        .await?;

        Ok(payment)
    }

    pub async fn get_payment(
        &self,
        id: &str,
    ) -> Result<Option<payments::Payment>, anyhow::Error> {
        let payment =
            sqlx::query_as::<_, payments::Payment>("SELECT * FROM payments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.conn)
                .await?;

        Ok(payment)
    }

    pub async fn get_payment_by_provider_ref(
        &self,
        provider_ref: &str,
    ) -> Result<Option<payments::Payment>, anyhow::Error> {
        let payment = sqlx::query_as::<_, payments::Payment>(
            "SELECT * FROM payments WHERE provider_ref = $1",
        )
        .bind(provider_ref)
        .fetch_optional(&self.conn)
        .await?;

        Ok(payment)
    }

    /// Direct-transfer invoices waiting for an on-chain match. Gateway
    /// invoices (provider_ref set) are completed by the IPN webhook instead.
    pub async fn pending_chain_payments(
        &self,
    ) -> Result<Vec<payments::Payment>, anyhow::Error> {
        let pending = sqlx::query_as::<_, payments::Payment>(
            "SELECT * FROM payments WHERE method = 'crypto' AND status = 'pending' AND provider_ref IS NULL ORDER BY created_at",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(pending)
    }

    pub async fn spent_tx_hashes(&self) -> Result<Vec<String>, anyhow::Error> {
        let hashes: Vec<String> =
            sqlx::query_scalar("SELECT tx_hash FROM payments WHERE tx_hash IS NOT NULL")
                .fetch_all(&self.conn)
                .await?;

        Ok(hashes)
    }

    /// Completes a pending payment, once. Returns None when the row already
    /// left 'pending' so duplicate webhooks and concurrent polls collapse to
    /// a single completion. The unique index on tx_hash rejects a hash that
    /// another payment already claimed.
    pub async fn complete_payment(
        &self,
        id: &str,
        tx_hash: Option<&str>,
    ) -> Result<Option<payments::Payment>, anyhow::Error> {
        let payment = sqlx::query_as::<_, payments::Payment>(
            r#"UPDATE payments
            SET status = 'completed', tx_hash = COALESCE($2, tx_hash), updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tx_hash)
        .fetch_optional(&self.conn)
        .await?;

        Ok(payment)
    }

    pub async fn expire_payment(&self, id: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'expired', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn expire_stale_payments(&self, expiry_secs: i64) -> Result<u64, anyhow::Error> {
        let result = sqlx::query(
            r#"UPDATE payments
            SET status = 'expired', updated_at = CURRENT_TIMESTAMP
            WHERE method = 'crypto' AND status = 'pending' AND provider_ref IS NULL
            AND created_at < CURRENT_TIMESTAMP - make_interval(secs => $1)
            "#,
        )
        .bind(expiry_secs as f64)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}
