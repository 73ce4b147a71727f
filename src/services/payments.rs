use super::documents::DocumentRequest;
use super::referrals::ReferralRequest;
use super::{RequestHandler, Service, ServiceError};

use crate::models::payments;
use crate::repositories::payments::{GatewayApi, PaymentRepository, PspApi};
use crate::settings;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::{mpsc, oneshot};

pub enum PaymentRequest {
    CreatePixCharge {
        new: payments::NewPixPayment,
        response: oneshot::Sender<Result<(payments::Payment, payments::PixCharge), ServiceError>>,
    },
    CreateCryptoPayment {
        new: payments::NewCryptoPayment,
        response: oneshot::Sender<Result<(payments::Payment, String), ServiceError>>,
    },
    CreateGatewayInvoice {
        new: payments::NewGatewayInvoice,
        response:
            oneshot::Sender<Result<(payments::Payment, payments::GatewayInvoice), ServiceError>>,
    },
    PixStatusUpdate {
        status: payments::PixChargeStatus,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GatewayIpn {
        payload: payments::IpnPayload,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    CompleteFromChain {
        payment_id: String,
        tx_hash: String,
    },
}

#[derive(Clone)]
pub struct PaymentRequestHandler {
    repository: PaymentRepository,
    psp: PspApi,
    gateway: GatewayApi,
    tokens: Vec<settings::Token>,
    deposit_address: String,
    document_channel: mpsc::Sender<DocumentRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
}

impl PaymentRequestHandler {
    pub fn new(
        sql_conn: PgPool,
        pix: settings::Pix,
        crypto: settings::Crypto,
        document_channel: mpsc::Sender<DocumentRequest>,
        referral_channel: mpsc::Sender<ReferralRequest>,
    ) -> Self {
        let repository = PaymentRepository::new(sql_conn);
        let psp = PspApi::new(pix.auth_token, pix.url);
        let gateway = GatewayApi::new(crypto.gateway_api_key, crypto.gateway_url);

        PaymentRequestHandler {
            repository,
            psp,
            gateway,
            tokens: crypto.tokens,
            deposit_address: crypto.deposit_address,
            document_channel,
            referral_channel,
        }
    }

    async fn create_pix_charge(
        &self,
        new: payments::NewPixPayment,
    ) -> Result<(payments::Payment, payments::PixCharge), ServiceError> {
        if new.amount_in_cents <= 0 {
            return Err(ServiceError::InvalidRequest(
                "amount_in_cents must be positive".to_string(),
            ));
        }

        let charge = self
            .psp
            .create_charge(new.amount_in_cents)
            .await
            .map_err(|e| {
                ServiceError::ExternalService(
                    "PaymentService".to_string(),
                    "Psp".to_string(),
                    e.to_string(),
                )
            })?;

        let payment = self
            .repository
            .insert_pix_payment(&new.document_id, new.amount_in_cents, &charge.id)
            .await
            .map_err(|e| ServiceError::Repository("Payment".to_string(), e.to_string()))?;

        Ok((payment, charge))
    }

    async fn create_crypto_payment(
        &self,
        new: payments::NewCryptoPayment,
    ) -> Result<(payments::Payment, String), ServiceError> {
        if new.amount_in_cents <= 0 {
            return Err(ServiceError::InvalidRequest(
                "amount_in_cents must be positive".to_string(),
            ));
        }

        if new.expected_amount <= 0.0 {
            return Err(ServiceError::InvalidRequest(
                "expected_amount must be positive".to_string(),
            ));
        }

        if !self.tokens.iter().any(|t| t.symbol == new.token_symbol) {
            return Err(ServiceError::InvalidRequest(format!(
                "Unsupported token: {}",
                new.token_symbol
            )));
        }

        let payment = self
            .repository
            .insert_crypto_payment(
                &new.document_id,
                new.amount_in_cents,
                &new.token_symbol,
                new.expected_amount,
            )
            .await
            .map_err(|e| ServiceError::Repository("Payment".to_string(), e.to_string()))?;

        Ok((payment, self.deposit_address.clone()))
    }

    async fn create_gateway_invoice(
        &self,
        new: payments::NewGatewayInvoice,
    ) -> Result<(payments::Payment, payments::GatewayInvoice), ServiceError> {
        if new.amount_in_cents <= 0 {
            return Err(ServiceError::InvalidRequest(
                "amount_in_cents must be positive".to_string(),
            ));
        }

        let order_id = uuid::Uuid::new_v4().hyphenated().to_string();
        let invoice = self
            .gateway
            .create_invoice(&order_id, new.amount_in_cents, &new.pay_currency)
            .await
            .map_err(|e| {
                ServiceError::ExternalService(
                    "PaymentService".to_string(),
                    "Gateway".to_string(),
                    e.to_string(),
                )
            })?;

        let payment = self
            .repository
            .insert_gateway_payment(
                &new.document_id,
                new.amount_in_cents,
                &new.pay_currency,
                &invoice.id,
            )
            .await
            .map_err(|e| ServiceError::Repository("Payment".to_string(), e.to_string()))?;

        Ok((payment, invoice))
    }

    async fn pix_status_update(
        &self,
        status: payments::PixChargeStatus,
    ) -> Result<(), ServiceError> {
        let payment = self
            .repository
            .get_payment_by_provider_ref(&status.charge_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Charge {}", status.charge_id)))?;

        match status.status.as_str() {
            "paid" => self.complete_payment(&payment.id, None).await,
            "expired" => {
                self.repository
                    .expire_payment(&payment.id)
                    .await
                    .map_err(|e| ServiceError::Database(e.to_string()))?;
                Ok(())
            }
            other => {
                log::info!("Ignoring PIX charge status '{}' for {}.", other, payment.id);
                Ok(())
            }
        }
    }

    async fn gateway_ipn(&self, payload: payments::IpnPayload) -> Result<(), ServiceError> {
        let payment = self
            .repository
            .get_payment_by_provider_ref(&payload.invoice_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {}", payload.invoice_id)))?;

        match payload.payment_status.as_str() {
            "finished" => self.complete_payment(&payment.id, None).await,
            "expired" | "failed" => {
                self.repository
                    .expire_payment(&payment.id)
                    .await
                    .map_err(|e| ServiceError::Database(e.to_string()))?;
                Ok(())
            }
            other => {
                log::info!("Ignoring IPN status '{}' for {}.", other, payment.id);
                Ok(())
            }
        }
    }

    /// Single completion path for all three payment flows. The repository
    /// only flips rows that are still pending; a replay of an already
    /// completed payment skips the flip but still notifies downstream.
    async fn complete_payment(
        &self,
        payment_id: &str,
        tx_hash: Option<&str>,
    ) -> Result<(), ServiceError> {
        let payment = self
            .repository
            .complete_payment(payment_id, tx_hash)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let payment = match payment {
            Some(payment) => payment,
            None => {
                // Replayed completion. Re-run the downstream steps anyway:
                // they are all idempotent, and this is the retry path for a
                // certificate pin that failed on the first pass.
                let existing = self
                    .repository
                    .get_payment(payment_id)
                    .await
                    .map_err(|e| ServiceError::Database(e.to_string()))?;

                match existing {
                    Some(existing) if existing.status == "completed" => {
                        log::info!("Replaying completion of payment {}.", payment_id);
                        existing
                    }
                    _ => {
                        log::info!("Payment {} is not completable.", payment_id);
                        return Ok(());
                    }
                }
            }
        };

        let document_channel = self.document_channel.clone();
        let referral_channel = self.referral_channel.clone();
        let document_id = payment.document_id.clone();
        let completed_id = payment.id.clone();
        let amount_in_cents = payment.amount_in_cents;

        tokio::spawn(async move {
            let _ = document_channel
                .send(DocumentRequest::PaymentCompleted {
                    document_id: document_id.clone(),
                    payment_id: completed_id.clone(),
                })
                .await;

            let _ = referral_channel
                .send(ReferralRequest::CreditCommission {
                    document_id,
                    payment_id: completed_id,
                    amount_in_cents,
                })
                .await;
        });

        Ok(())
    }
}

#[async_trait]
impl RequestHandler<PaymentRequest> for PaymentRequestHandler {
    async fn handle_request(&self, request: PaymentRequest) {
        match request {
            PaymentRequest::CreatePixCharge { new, response } => {
                let result = self.create_pix_charge(new).await;
                let _ = response.send(result);
            }
            PaymentRequest::CreateCryptoPayment { new, response } => {
                let result = self.create_crypto_payment(new).await;
                let _ = response.send(result);
            }
            PaymentRequest::CreateGatewayInvoice { new, response } => {
                let result = self.create_gateway_invoice(new).await;
                let _ = response.send(result);
            }
            PaymentRequest::PixStatusUpdate { status, response } => {
                let result = self.pix_status_update(status).await;
                let _ = response.send(result);
            }
            PaymentRequest::GatewayIpn { payload, response } => {
                let result = self.gateway_ipn(payload).await;
                let _ = response.send(result);
            }
            PaymentRequest::CompleteFromChain {
                payment_id,
                tx_hash,
            } => {
                if let Err(e) = self.complete_payment(&payment_id, Some(&tx_hash)).await {
                    log::error!("Could not complete payment {}: {}", payment_id, e);
                }
            }
        }
    }
}

pub struct PaymentService;

impl PaymentService {
    pub fn new() -> Self {
        PaymentService {}
    }
}

#[async_trait]
impl Service<PaymentRequest, PaymentRequestHandler> for PaymentService {}
