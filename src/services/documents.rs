use super::{RequestHandler, Service, ServiceError};

use crate::models::documents;
use crate::repositories::documents::DocumentRepository;
use crate::repositories::email::EmailApi;
use crate::repositories::ipfs::IpfsApi;
use crate::settings;

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::oneshot;

/// Certificate codes avoid glyphs that read ambiguously when printed.
const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

pub enum DocumentRequest {
    Register {
        new: documents::NewDocument,
        response: oneshot::Sender<Result<documents::Document, ServiceError>>,
    },
    GetByCode {
        certificate_code: String,
        response: oneshot::Sender<Result<Option<documents::Document>, ServiceError>>,
    },
    PaymentCompleted {
        document_id: String,
        payment_id: String,
    },
}

#[derive(Clone)]
pub struct DocumentRequestHandler {
    repository: DocumentRepository,
    ipfs: IpfsApi,
    email: EmailApi,
}

impl DocumentRequestHandler {
    pub fn new(sql_conn: PgPool, ipfs: settings::Ipfs, email: settings::Email) -> Self {
        let repository = DocumentRepository::new(sql_conn);
        let ipfs = IpfsApi::new(ipfs.jwt, ipfs.url);
        let email = EmailApi::new(email.api_key, email.url, email.from);

        DocumentRequestHandler {
            repository,
            ipfs,
            email,
        }
    }

    async fn register_document(
        &self,
        new: documents::NewDocument,
    ) -> Result<documents::Document, ServiceError> {
        if !is_valid_sha256(&new.sha256) {
            return Err(ServiceError::InvalidRequest(
                "sha256 must be 64 lowercase hex characters".to_string(),
            ));
        }

        let certificate_code = generate_certificate_code();
        let document = self
            .repository
            .insert_document(&new, &certificate_code)
            .await
            .map_err(|e| {
                if e.to_string() == "DocumentAlreadyNotarized" {
                    ServiceError::InvalidRequest("Document is already notarized.".to_string())
                } else {
                    ServiceError::Repository("Document".to_string(), e.to_string())
                }
            })?;

        Ok(document)
    }

    async fn get_by_code(
        &self,
        certificate_code: &str,
    ) -> Result<Option<documents::Document>, ServiceError> {
        self.repository
            .get_document_by_code(certificate_code)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn payment_completed(
        &self,
        document_id: &str,
        payment_id: &str,
    ) -> Result<(), ServiceError> {
        let marked = self
            .repository
            .mark_paid(document_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        if !marked {
            log::info!("Document {} was already marked paid.", document_id);
        }

        self.issue_certificate(document_id, payment_id).await
    }

    /// Pins the certificate JSON and stores the CID. Idempotent: a document
    /// that already carries a CID is left untouched.
    async fn issue_certificate(
        &self,
        document_id: &str,
        payment_id: &str,
    ) -> Result<(), ServiceError> {
        let document = self
            .repository
            .get_document(document_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Document {}", document_id)))?;

        if document.certificate_cid.is_some() {
            return Ok(());
        }

        let certificate = json!({
            "certificate_code": document.certificate_code,
            "sha256": document.sha256,
            "requester_name": document.requester_name,
            "payment_reference": payment_id,
            "issued_at": chrono::Utc::now().to_rfc3339(),
        });

        let cid = self
            .ipfs
            .pin_json(&document.certificate_code, &certificate)
            .await
            .map_err(|e| {
                ServiceError::ExternalService(
                    "DocumentService".to_string(),
                    "Ipfs".to_string(),
                    e.to_string(),
                )
            })?;

        self.repository
            .set_certificate(document_id, &cid)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        // Notification failures never fail the issuance itself.
        if let Err(e) = self
            .email
            .send_template(
                &document.requester_email,
                "certificate_issued",
                json!({
                    "name": document.requester_name,
                    "certificate_code": document.certificate_code,
                    "cid": cid,
                }),
            )
            .await
        {
            log::error!(
                "Could not send certificate email for {}: {}",
                document.certificate_code,
                e
            );
        }

        Ok(())
    }
}

#[async_trait]
impl RequestHandler<DocumentRequest> for DocumentRequestHandler {
    async fn handle_request(&self, request: DocumentRequest) {
        match request {
            DocumentRequest::Register { new, response } => {
                let document = self.register_document(new).await;
                let _ = response.send(document);
            }
            DocumentRequest::GetByCode {
                certificate_code,
                response,
            } => {
                let document = self.get_by_code(&certificate_code).await;
                let _ = response.send(document);
            }
            DocumentRequest::PaymentCompleted {
                document_id,
                payment_id,
            } => {
                if let Err(e) = self.payment_completed(&document_id, &payment_id).await {
                    log::error!("Could not certify document {}: {}", document_id, e);
                }
            }
        }
    }
}

pub fn generate_certificate_code() -> String {
    let mut rng = rand::thread_rng();
    let mut group = || -> String {
        (0..4)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    };

    format!("SELO-{}-{}", group(), group())
}

pub fn is_valid_sha256(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub struct DocumentService;

impl DocumentService {
    pub fn new() -> Self {
        DocumentService {}
    }
}

#[async_trait]
impl Service<DocumentRequest, DocumentRequestHandler> for DocumentService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_code_has_expected_shape() {
        let code = generate_certificate_code();
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SELO");
        assert_eq!(parts[1].len(), 4);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn certificate_code_skips_ambiguous_glyphs() {
        for _ in 0..100 {
            let code = generate_certificate_code();
            for c in code.chars().skip(5) {
                assert!(!matches!(c, '0' | 'O' | '1' | 'I' | 'L'), "bad glyph in {}", code);
            }
        }
    }

    #[test]
    fn sha256_validation() {
        let valid = "a".repeat(64);
        assert!(is_valid_sha256(&valid));

        assert!(!is_valid_sha256("deadbeef"));
        assert!(!is_valid_sha256(&"A".repeat(64)));
        assert!(!is_valid_sha256(&"g".repeat(64)));
    }
}
