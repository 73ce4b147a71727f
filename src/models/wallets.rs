use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: String,
    pub currency: String,
    pub balance_in_cents: i64,
    pub last_withdrawal_at: Option<chrono::NaiveDateTime>,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub currency: String,
    pub amount_in_cents: i64,
    pub pix_key: Option<String>,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewWithdrawal {
    pub user_id: String,
    pub currency: String,
    pub amount_in_cents: i64,
    pub pix_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawalReview {
    pub approve: bool,
}
