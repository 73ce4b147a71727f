use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    pub requester_name: String,
    pub requester_email: String,
    pub sha256: String,
    pub file_url: Option<String>,
    pub certificate_code: String,
    pub certificate_cid: Option<String>,
    pub referral_id: Option<String>,
    pub payment_status: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewDocument {
    pub requester_name: String,
    pub requester_email: String,
    pub sha256: String,
    pub file_url: Option<String>,
    pub referral_code: Option<String>,
}
