use crate::models::{documents, referrals};

use anyhow::bail;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct DocumentRepository {
    conn: PgPool,
}

impl DocumentRepository {
    pub fn new(conn: PgPool) -> Self {
        DocumentRepository { conn }
    }

    pub async fn insert_document(
        &self,
        new: &documents::NewDocument,
        certificate_code: &str,
    ) -> Result<documents::Document, anyhow::Error> {
        let notarized: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE sha256 = $1 AND payment_status IN ('paid', 'certified'))",
        )
        .bind(&new.sha256)
        .fetch_one(&self.conn)
        .await?;

        if notarized {
            bail!("DocumentAlreadyNotarized")
        }

        let referral_id: Option<String> = match &new.referral_code {
            Some(code) => {
                let referral = sqlx::query_as::<_, referrals::Referral>(
                    "SELECT * FROM referrals WHERE referral_code = $1",
                )
                .bind(code)
                .fetch_optional(&self.conn)
                .await?;

                referral.map(|r| r.id)
            }
            None => None,
        };

        let document_id = Uuid::new_v4().hyphenated().to_string();
        let document = sqlx::query_as::<_, documents::Document>(
            r#"INSERT INTO documents
            (id, requester_name, requester_email, sha256, file_url, certificate_code, referral_id, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING *
            "#,
        )
        .bind(&document_id)
        .bind(&new.requester_name)
        .bind(&new.requester_email)
        .bind(&new.sha256)
        .bind(&new.file_url)
        .bind(certificate_code)
        .bind(&referral_id)
        .fetch_one(&self.conn)
        .await?;

        Ok(document)
    }

    pub async fn get_document(
        &self,
        id: &str,
    ) -> Result<Option<documents::Document>, anyhow::Error> {
        let document =
            sqlx::query_as::<_, documents::Document>("SELECT * FROM documents WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.conn)
                .await?;

        Ok(document)
    }

    pub async fn get_document_by_code(
        &self,
        certificate_code: &str,
    ) -> Result<Option<documents::Document>, anyhow::Error> {
        let document = sqlx::query_as::<_, documents::Document>(
            "SELECT * FROM documents WHERE certificate_code = $1",
        )
        .bind(certificate_code)
        .fetch_optional(&self.conn)
        .await?;

        Ok(document)
    }

    /// Flips a pending document to 'paid'. Returns false when the row was
    /// already past 'pending' (duplicate webhook or poll).
    pub async fn mark_paid(&self, id: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            "UPDATE documents SET payment_status = 'paid', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND payment_status = 'pending'",
        )
        .bind(id)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_certificate(&self, id: &str, cid: &str) -> Result<(), anyhow::Error> {
        sqlx::query(
            "UPDATE documents SET certificate_cid = $2, payment_status = 'certified', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND certificate_cid IS NULL",
        )
        .bind(id)
        .bind(cid)
        .execute(&self.conn)
        .await?;

        Ok(())
    }
}
