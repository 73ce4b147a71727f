use crate::models::referrals;

use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReferralRepository {
    conn: PgPool,
}

impl ReferralRepository {
    pub fn new(conn: PgPool) -> Self {
        ReferralRepository { conn }
    }

    pub async fn insert_referral(
        &self,
        user_id: &str,
        referral_code: &str,
        commission_bps: i64,
    ) -> Result<referrals::Referral, anyhow::Error> {
        let referral_id = Uuid::new_v4().hyphenated().to_string();

        let referral = sqlx::query_as::<_, referrals::Referral>(
            r#"INSERT INTO referrals (id, user_id, referral_code, commission_bps)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&referral_id)
        .bind(user_id)
        .bind(referral_code)
        .bind(commission_bps)
        .fetch_one(&self.conn)
        .await?;

        Ok(referral)
    }

    pub async fn get_referral_by_code(
        &self,
        referral_code: &str,
    ) -> Result<Option<referrals::Referral>, anyhow::Error> {
        let referral = sqlx::query_as::<_, referrals::Referral>(
            "SELECT * FROM referrals WHERE referral_code = $1",
        )
        .bind(referral_code)
        .fetch_optional(&self.conn)
        .await?;

        Ok(referral)
    }

    pub async fn get_referral_for_document(
        &self,
        document_id: &str,
    ) -> Result<Option<referrals::Referral>, anyhow::Error> {
        let referral = sqlx::query_as::<_, referrals::Referral>(
            r#"SELECT r.* FROM referrals r
            JOIN documents d ON d.referral_id = r.id
            WHERE d.id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(referral)
    }

    /// Records a commission for a completed payment and credits the
    /// referrer's wallet in the same transaction, so neither can land
    /// without the other. The unique index on payment_id makes replays a
    /// no-op; returns None in that case.
    pub async fn credit_commission(
        &self,
        referral: &referrals::Referral,
        payment_id: &str,
        amount_in_cents: i64,
        currency: &str,
    ) -> Result<Option<referrals::Commission>, anyhow::Error> {
        let commission_id = Uuid::new_v4().hyphenated().to_string();
        let mut tx = self.conn.begin().await?;

        let commission = sqlx::query_as::<_, referrals::Commission>(
            r#"INSERT INTO commissions (id, referral_id, payment_id, amount_in_cents)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (payment_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&commission_id)
        .bind(&referral.id)
        .bind(payment_id)
        .bind(amount_in_cents)
        .fetch_optional(&mut *tx)
        .await?;

        let commission = match commission {
            Some(commission) => commission,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        sqlx::query(
            r#"INSERT INTO wallets (user_id, currency, balance_in_cents)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, currency)
            DO UPDATE SET balance_in_cents = wallets.balance_in_cents + EXCLUDED.balance_in_cents
            "#,
        )
        .bind(&referral.user_id)
        .bind(currency)
        .bind(amount_in_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(commission))
    }
}
