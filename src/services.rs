use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::settings::Settings;

mod documents;
mod http;
mod payments;
mod reconciliation;
mod referrals;
mod wallets;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("External service error: {0} -> {1} => {2}")]
    ExternalService(String, String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (document_tx, mut document_rx) = mpsc::channel(512);
    let (payment_tx, mut payment_rx) = mpsc::channel(512);
    let (referral_tx, mut referral_rx) = mpsc::channel(512);
    let (wallet_tx, mut wallet_rx) = mpsc::channel(512);

    let mut document_service = documents::DocumentService::new();
    let mut payment_service = payments::PaymentService::new();
    let mut referral_service = referrals::ReferralService::new();
    let mut wallet_service = wallets::WalletService::new();

    log::info!("Starting document service.");
    let document_pool_clone = pool.clone();
    let document_ipfs = settings.ipfs.clone();
    let document_email = settings.email.clone();
    tokio::spawn(async move {
        document_service
            .run(
                documents::DocumentRequestHandler::new(
                    document_pool_clone,
                    document_ipfs,
                    document_email,
                ),
                &mut document_rx,
            )
            .await;
    });

    log::info!("Starting payment service.");
    let payment_pool_clone = pool.clone();
    let payment_pix = settings.pix.clone();
    let payment_crypto = settings.crypto.clone();
    let payment_document_tx = document_tx.clone();
    let payment_referral_tx = referral_tx.clone();
    tokio::spawn(async move {
        payment_service
            .run(
                payments::PaymentRequestHandler::new(
                    payment_pool_clone,
                    payment_pix,
                    payment_crypto,
                    payment_document_tx,
                    payment_referral_tx,
                ),
                &mut payment_rx,
            )
            .await;
    });

    log::info!("Starting referral service.");
    let referral_pool_clone = pool.clone();
    let default_commission_bps = settings.referrals.default_commission_bps;
    tokio::spawn(async move {
        referral_service
            .run(
                referrals::ReferralRequestHandler::new(referral_pool_clone, default_commission_bps),
                &mut referral_rx,
            )
            .await;
    });

    log::info!("Starting wallet service.");
    let wallet_pool_clone = pool.clone();
    let wallet_rules = settings.withdrawals.clone();
    tokio::spawn(async move {
        wallet_service
            .run(
                wallets::WalletRequestHandler::new(wallet_pool_clone, wallet_rules),
                &mut wallet_rx,
            )
            .await;
    });

    log::info!("Starting reconciliation job.");
    let reconciliation_pool_clone = pool.clone();
    let reconciliation_crypto = settings.crypto.clone();
    let reconciliation_payment_tx = payment_tx.clone();
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        let job = reconciliation::ReconciliationJob::new(
            reconciliation_pool_clone,
            reconciliation_crypto,
            reconciliation_payment_tx,
        );

        job.run(shutdown_rx).await;
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    log::info!("Starting HTTP server.");
    http::start_http_server(
        settings.server,
        settings.crypto.ipn_secret.clone(),
        document_tx,
        payment_tx,
        referral_tx,
        wallet_tx,
    )
    .await?;

    Ok(())
}
