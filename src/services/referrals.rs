use super::{RequestHandler, Service, ServiceError};

use crate::models::referrals;
use crate::repositories::referrals::ReferralRepository;

use async_trait::async_trait;
use rand::Rng;
use sqlx::PgPool;
use tokio::sync::oneshot;

const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";
const CODE_LEN: usize = 8;

pub enum ReferralRequest {
    CreateCode {
        new: referrals::NewReferral,
        response: oneshot::Sender<Result<referrals::Referral, ServiceError>>,
    },
    GetByCode {
        referral_code: String,
        response: oneshot::Sender<Result<Option<referrals::Referral>, ServiceError>>,
    },
    CreditCommission {
        document_id: String,
        payment_id: String,
        amount_in_cents: i64,
    },
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    repository: ReferralRepository,
    default_commission_bps: i64,
}

impl ReferralRequestHandler {
    pub fn new(sql_conn: PgPool, default_commission_bps: i64) -> Self {
        let repository = ReferralRepository::new(sql_conn);

        ReferralRequestHandler {
            repository,
            default_commission_bps,
        }
    }

    async fn create_code(
        &self,
        new: referrals::NewReferral,
    ) -> Result<referrals::Referral, ServiceError> {
        let code = generate_referral_code();

        self.repository
            .insert_referral(&new.user_id, &code, self.default_commission_bps)
            .await
            .map_err(|e| ServiceError::Repository("Referral".to_string(), e.to_string()))
    }

    async fn get_by_code(
        &self,
        referral_code: &str,
    ) -> Result<Option<referrals::Referral>, ServiceError> {
        self.repository
            .get_referral_by_code(referral_code)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    /// Credits the referrer once per payment. The commission row and the
    /// wallet credit land in one repository transaction, and the commission
    /// row's unique payment_id makes replays a no-op.
    async fn credit_commission(
        &self,
        document_id: &str,
        payment_id: &str,
        amount_in_cents: i64,
    ) -> Result<(), ServiceError> {
        let referral = self
            .repository
            .get_referral_for_document(document_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let referral = match referral {
            Some(referral) => referral,
            None => return Ok(()),
        };

        let commission = match commission_for(amount_in_cents, referral.commission_bps) {
            Some(commission) => commission,
            None => return Ok(()),
        };

        let credited = self
            .repository
            .credit_commission(&referral, payment_id, commission, "BRL")
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        match credited {
            Some(commission) => log::info!(
                "Credited commission of {} cents to {} for payment {}.",
                commission.amount_in_cents,
                referral.user_id,
                payment_id
            ),
            None => log::info!("Commission for payment {} already credited.", payment_id),
        }

        Ok(())
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::CreateCode { new, response } => {
                let referral = self.create_code(new).await;
                let _ = response.send(referral);
            }
            ReferralRequest::GetByCode {
                referral_code,
                response,
            } => {
                let referral = self.get_by_code(&referral_code).await;
                let _ = response.send(referral);
            }
            ReferralRequest::CreditCommission {
                document_id,
                payment_id,
                amount_in_cents,
            } => {
                if let Err(e) = self
                    .credit_commission(&document_id, &payment_id, amount_in_cents)
                    .await
                {
                    log::error!("Could not credit commission for {}: {}", payment_id, e);
                }
            }
        }
    }
}

pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();

    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Commission owed for a payment, or None when nothing should be credited.
/// Floor division: partial cents stay with the platform. Amounts that are
/// zero or negative never produce a credit.
pub fn commission_for(amount_in_cents: i64, commission_bps: i64) -> Option<i64> {
    let commission = amount_in_cents * commission_bps / 10_000;

    (commission > 0).then_some(commission)
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_math() {
        // 5% of R$ 100,00
        assert_eq!(commission_for(10_000, 500), Some(500));
        // 2.5% of R$ 3,33 rounds down
        assert_eq!(commission_for(333, 250), Some(8));
        // below one cent credits nothing
        assert_eq!(commission_for(3, 250), None);
    }

    #[test]
    fn negative_amounts_never_credit() {
        // A negative amount would otherwise debit the referrer's wallet.
        assert_eq!(commission_for(-10_000, 500), None);
        assert_eq!(commission_for(0, 500), None);
        assert_eq!(commission_for(-1, 10_000), None);
    }

    #[test]
    fn referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }
}
