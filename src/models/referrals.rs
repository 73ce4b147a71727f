use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Referral {
    pub id: String,
    pub user_id: String,
    pub referral_code: String,
    pub commission_bps: i64,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Commission {
    pub id: String,
    pub referral_id: String,
    pub payment_id: String,
    pub amount_in_cents: i64,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewReferral {
    pub user_id: String,
}
