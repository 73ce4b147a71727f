use crate::models::wallets;

use anyhow::bail;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct WalletRepository {
    conn: PgPool,
}

impl WalletRepository {
    pub fn new(conn: PgPool) -> Self {
        WalletRepository { conn }
    }

    pub async fn get_wallet(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<Option<wallets::Wallet>, anyhow::Error> {
        let wallet = sqlx::query_as::<_, wallets::Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 AND currency = $2",
        )
        .bind(user_id)
        .bind(currency)
        .fetch_optional(&self.conn)
        .await?;

        Ok(wallet)
    }

    pub async fn get_wallets(
        &self,
        user_id: &str,
    ) -> Result<Vec<wallets::Wallet>, anyhow::Error> {
        let wallets = sqlx::query_as::<_, wallets::Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 ORDER BY currency",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(wallets)
    }

    pub async fn credit_balance(
        &self,
        user_id: &str,
        currency: &str,
        amount_in_cents: i64,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"INSERT INTO wallets (user_id, currency, balance_in_cents)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, currency)
            DO UPDATE SET balance_in_cents = wallets.balance_in_cents + EXCLUDED.balance_in_cents
            "#,
        )
        .bind(user_id)
        .bind(currency)
        .bind(amount_in_cents)
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    /// Debits the balance and inserts the withdrawal row in one transaction.
    /// The guarded UPDATE is the authoritative balance and cooldown check;
    /// the service layer's rule check only produces friendlier errors. Two
    /// concurrent requests both pass the service-side read, but only the
    /// first can match this predicate.
    pub async fn insert_withdrawal(
        &self,
        new: &wallets::NewWithdrawal,
        cooldown_secs: i64,
    ) -> Result<wallets::Withdrawal, anyhow::Error> {
        let withdrawal_id = Uuid::new_v4().hyphenated().to_string();
        let mut tx = self.conn.begin().await?;

        let debited = sqlx::query(
            r#"UPDATE wallets
            SET balance_in_cents = balance_in_cents - $3, last_withdrawal_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND currency = $2 AND balance_in_cents >= $3
            AND (last_withdrawal_at IS NULL
                OR last_withdrawal_at < CURRENT_TIMESTAMP - make_interval(secs => $4))
            "#,
        )
        .bind(&new.user_id)
        .bind(&new.currency)
        .bind(new.amount_in_cents)
        .bind(cooldown_secs as f64)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() != 1 {
            bail!("WithdrawalNotAllowed")
        }

        let withdrawal = sqlx::query_as::<_, wallets::Withdrawal>(
            r#"INSERT INTO withdrawals (id, user_id, currency, amount_in_cents, pix_key, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING *
            "#,
        )
        .bind(&withdrawal_id)
        .bind(&new.user_id)
        .bind(&new.currency)
        .bind(new.amount_in_cents)
        .bind(&new.pix_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    pub async fn list_withdrawals(
        &self,
        user_id: &str,
    ) -> Result<Vec<wallets::Withdrawal>, anyhow::Error> {
        let withdrawals = sqlx::query_as::<_, wallets::Withdrawal>(
            "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    /// Moves a withdrawal along its lifecycle. The current status is part of
    /// the predicate so an already-moved row is never transitioned twice.
    pub async fn transition_withdrawal(
        &self,
        id: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<wallets::Withdrawal>, anyhow::Error> {
        let withdrawal = sqlx::query_as::<_, wallets::Withdrawal>(
            r#"UPDATE withdrawals
            SET status = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.conn)
        .await?;

        Ok(withdrawal)
    }
}
