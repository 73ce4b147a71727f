use super::payments::PaymentRequest;

use crate::models::payments::TokenTransfer;
use crate::repositories::payments::{ExplorerApi, PaymentRepository};
use crate::settings;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;

/// Single tolerance pair for every matching path. Relative covers normal
/// amounts, the absolute floor covers sub-unit ones where the relative band
/// collapses below float noise.
pub const RELATIVE_TOLERANCE: f64 = 1e-4;
pub const ABSOLUTE_TOLERANCE: f64 = 1e-6;

pub fn amounts_match(expected: f64, observed: f64) -> bool {
    let diff = (expected - observed).abs();
    diff <= ABSOLUTE_TOLERANCE || diff <= expected.abs() * RELATIVE_TOLERANCE
}

/// Converts the explorer's raw integer string by the token's decimal count.
pub fn transfer_amount(transfer: &TokenTransfer, decimals: u32) -> Option<f64> {
    let raw: u128 = transfer.value.parse().ok()?;
    Some(raw as f64 / 10f64.powi(decimals as i32))
}

/// Accepts the first transfer to the deposit address, in the expected token,
/// within tolerance of the expected amount, whose hash no payment has
/// claimed yet. Deterministic in the order of `transfers`.
pub fn match_transfer<'a>(
    expected_amount: f64,
    token: &settings::Token,
    deposit_address: &str,
    transfers: &'a [TokenTransfer],
    spent_hashes: &HashSet<String>,
) -> Option<&'a TokenTransfer> {
    transfers.iter().find(|transfer| {
        if !transfer.to.eq_ignore_ascii_case(deposit_address) {
            return false;
        }

        if !transfer.contract_address.eq_ignore_ascii_case(&token.contract) {
            return false;
        }

        if spent_hashes.contains(&transfer.hash.to_lowercase()) {
            return false;
        }

        // The explorer reports the token's decimal count on every row. A
        // count that disagrees with the configured token would mis-scale
        // the amount, so such a row never matches.
        match transfer.token_decimal.parse::<u32>() {
            Ok(decimals) if decimals == token.decimals => {}
            _ => return false,
        }

        match transfer_amount(transfer, token.decimals) {
            Some(observed) => amounts_match(expected_amount, observed),
            None => false,
        }
    })
}

pub struct ReconciliationJob {
    repository: PaymentRepository,
    explorer: ExplorerApi,
    crypto: settings::Crypto,
    payment_channel: mpsc::Sender<PaymentRequest>,
}

impl ReconciliationJob {
    pub fn new(
        sql_conn: PgPool,
        crypto: settings::Crypto,
        payment_channel: mpsc::Sender<PaymentRequest>,
    ) -> Self {
        let repository = PaymentRepository::new(sql_conn);
        let explorer = ExplorerApi::new(crypto.explorer_url.clone(), crypto.explorer_api_key.clone());

        ReconciliationJob {
            repository,
            explorer,
            crypto,
            payment_channel,
        }
    }

    /// Runs until the shutdown signal arrives. Explorer failures leave the
    /// pending payments for the next tick; the interval is the backoff.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.crypto.poll_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_pending().await {
                        log::error!("Reconciliation tick failed: {}", e);
                    }
                }
                _ = shutdown.recv() => {
                    log::info!("Reconciliation job shutting down.");
                    break;
                }
            }
        }
    }

    async fn reconcile_pending(&self) -> Result<(), anyhow::Error> {
        let expired = self
            .repository
            .expire_stale_payments(self.crypto.invoice_expiry_secs)
            .await?;
        if expired > 0 {
            log::info!("Expired {} stale crypto payments.", expired);
        }

        let pending = self.repository.pending_chain_payments().await?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut spent_hashes: HashSet<String> = self
            .repository
            .spent_tx_hashes()
            .await?
            .into_iter()
            .map(|h| h.to_lowercase())
            .collect();

        // One explorer call per token contract per tick.
        let mut transfers_by_contract: HashMap<String, Vec<TokenTransfer>> = HashMap::new();

        for payment in pending {
            let symbol = match &payment.token_symbol {
                Some(symbol) => symbol.clone(),
                None => continue,
            };
            let expected = match payment.expected_amount {
                Some(expected) => expected,
                None => continue,
            };

            let token = match self.crypto.tokens.iter().find(|t| t.symbol == symbol) {
                Some(token) => token.clone(),
                None => {
                    log::warn!("Payment {} references unknown token {}.", payment.id, symbol);
                    continue;
                }
            };

            if !transfers_by_contract.contains_key(&token.contract) {
                let transfers = self
                    .explorer
                    .token_transfers(&self.crypto.deposit_address, &token.contract)
                    .await?;
                transfers_by_contract.insert(token.contract.clone(), transfers);
            }
            let transfers = &transfers_by_contract[&token.contract];

            let matched = match_transfer(
                expected,
                &token,
                &self.crypto.deposit_address,
                transfers,
                &spent_hashes,
            );

            if let Some(transfer) = matched {
                let tx_hash = transfer.hash.to_lowercase();
                log::info!(
                    "Matched payment {} to transfer {} ({} {}).",
                    payment.id,
                    tx_hash,
                    expected,
                    symbol
                );

                // Claim the hash locally so a second pending payment with
                // the same expected amount cannot take it this tick.
                spent_hashes.insert(tx_hash.clone());

                let _ = self
                    .payment_channel
                    .send(PaymentRequest::CompleteFromChain {
                        payment_id: payment.id.clone(),
                        tx_hash,
                    })
                    .await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> settings::Token {
        settings::Token {
            symbol: "USDT".to_string(),
            contract: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            decimals: 6,
        }
    }

    fn transfer(hash: &str, to: &str, value: &str) -> TokenTransfer {
        TokenTransfer {
            hash: hash.to_string(),
            to: to.to_string(),
            contract_address: token().contract,
            value: value.to_string(),
            token_decimal: "6".to_string(),
        }
    }

    const DEPOSIT: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn exact_amount_matches() {
        assert!(amounts_match(125.0, 125.0));
    }

    #[test]
    fn amount_within_relative_tolerance_matches() {
        assert!(amounts_match(1000.0, 1000.0999));
        assert!(!amounts_match(1000.0, 1000.2));
    }

    #[test]
    fn tiny_amount_uses_absolute_floor() {
        // Relative band at 0.000001 is ~1e-10, the absolute floor governs.
        assert!(amounts_match(0.000001, 0.0000015));
        assert!(!amounts_match(0.000001, 0.00001));
    }

    #[test]
    fn transfer_amount_scales_by_decimals() {
        let t = transfer("0xaa", DEPOSIT, "125000000");
        assert_eq!(transfer_amount(&t, 6), Some(125.0));

        let bad = transfer("0xab", DEPOSIT, "not-a-number");
        assert_eq!(transfer_amount(&bad, 6), None);
    }

    #[test]
    fn picks_first_matching_transfer() {
        let transfers = vec![
            transfer("0xa1", DEPOSIT, "999000000"),
            transfer("0xa2", DEPOSIT, "125000000"),
            transfer("0xa3", DEPOSIT, "125000000"),
        ];

        let matched =
            match_transfer(125.0, &token(), DEPOSIT, &transfers, &HashSet::new()).unwrap();
        assert_eq!(matched.hash, "0xa2");
    }

    #[test]
    fn spent_hash_is_never_matched_twice() {
        let transfers = vec![
            transfer("0xa1", DEPOSIT, "125000000"),
            transfer("0xa2", DEPOSIT, "125000000"),
        ];

        let mut spent = HashSet::new();
        spent.insert("0xa1".to_string());

        let matched = match_transfer(125.0, &token(), DEPOSIT, &transfers, &spent).unwrap();
        assert_eq!(matched.hash, "0xa2");

        spent.insert("0xa2".to_string());
        assert!(match_transfer(125.0, &token(), DEPOSIT, &transfers, &spent).is_none());
    }

    #[test]
    fn mismatched_decimal_count_is_skipped() {
        let mut wrong_decimals = transfer("0xa1", DEPOSIT, "125000000");
        wrong_decimals.token_decimal = "18".to_string();

        let transfers = vec![wrong_decimals, transfer("0xa2", DEPOSIT, "125000000")];

        let matched =
            match_transfer(125.0, &token(), DEPOSIT, &transfers, &HashSet::new()).unwrap();
        assert_eq!(matched.hash, "0xa2");
    }

    #[test]
    fn wrong_recipient_or_contract_is_skipped() {
        let other_recipient = transfer("0xa1", "0x2222222222222222222222222222222222222222", "125000000");

        let mut other_contract = transfer("0xa2", DEPOSIT, "125000000");
        other_contract.contract_address =
            "0x3333333333333333333333333333333333333333".to_string();

        let transfers = vec![other_recipient, other_contract];
        assert!(match_transfer(125.0, &token(), DEPOSIT, &transfers, &HashSet::new()).is_none());
    }

    #[test]
    fn address_comparison_ignores_case() {
        let transfers = vec![transfer("0xA1", &DEPOSIT.to_uppercase(), "125000000")];

        let mut spent = HashSet::new();
        assert!(match_transfer(125.0, &token(), DEPOSIT, &transfers, &spent).is_some());

        // The spent set is kept lowercase.
        spent.insert("0xa1".to_string());
        assert!(match_transfer(125.0, &token(), DEPOSIT, &transfers, &spent).is_none());
    }
}
