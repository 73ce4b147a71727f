use super::{RequestHandler, Service, ServiceError};

use crate::models::wallets;
use crate::repositories::wallets::WalletRepository;
use crate::settings;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

pub enum WalletRequest {
    GetWallets {
        user_id: String,
        response: oneshot::Sender<Result<Vec<wallets::Wallet>, ServiceError>>,
    },
    RequestWithdrawal {
        new: wallets::NewWithdrawal,
        response: oneshot::Sender<Result<wallets::Withdrawal, ServiceError>>,
    },
    ReviewWithdrawal {
        id: String,
        approve: bool,
        response: oneshot::Sender<Result<wallets::Withdrawal, ServiceError>>,
    },
    MarkWithdrawalPaid {
        id: String,
        response: oneshot::Sender<Result<wallets::Withdrawal, ServiceError>>,
    },
    ListWithdrawals {
        user_id: String,
        response: oneshot::Sender<Result<Vec<wallets::Withdrawal>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct WalletRequestHandler {
    repository: WalletRepository,
    rules: settings::Withdrawals,
}

impl WalletRequestHandler {
    pub fn new(sql_conn: PgPool, rules: settings::Withdrawals) -> Self {
        let repository = WalletRepository::new(sql_conn);

        WalletRequestHandler { repository, rules }
    }

    async fn get_wallets(&self, user_id: &str) -> Result<Vec<wallets::Wallet>, ServiceError> {
        self.repository
            .get_wallets(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn request_withdrawal(
        &self,
        new: wallets::NewWithdrawal,
    ) -> Result<wallets::Withdrawal, ServiceError> {
        let wallet = self
            .repository
            .get_wallet(&new.user_id, &new.currency)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("{} wallet for {}", new.currency, new.user_id))
            })?;

        let now = chrono::Utc::now().naive_utc();
        check_withdrawal(
            &wallet,
            new.amount_in_cents,
            self.rules.min_amount_in_cents,
            self.rules.cooldown_secs,
            now,
        )
        .map_err(|reason| ServiceError::InvalidRequest(reason.to_string()))?;

        self.repository
            .insert_withdrawal(&new, self.rules.cooldown_secs)
            .await
            .map_err(|e| {
                if e.to_string() == "WithdrawalNotAllowed" {
                    ServiceError::InvalidRequest(
                        "Insufficient balance or withdrawal cooldown has not elapsed.".to_string(),
                    )
                } else {
                    ServiceError::Repository("Wallet".to_string(), e.to_string())
                }
            })
    }

    async fn review_withdrawal(
        &self,
        id: &str,
        approve: bool,
    ) -> Result<wallets::Withdrawal, ServiceError> {
        let to = if approve { "approved" } else { "rejected" };

        let withdrawal = self
            .repository
            .transition_withdrawal(id, "pending", to)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::InvalidRequest(format!("Withdrawal {} is not pending.", id))
            })?;

        // A rejection releases the hold taken at request time.
        if !approve {
            self.repository
                .credit_balance(
                    &withdrawal.user_id,
                    &withdrawal.currency,
                    withdrawal.amount_in_cents,
                )
                .await
                .map_err(|e| ServiceError::Database(e.to_string()))?;
        }

        Ok(withdrawal)
    }

    async fn mark_withdrawal_paid(&self, id: &str) -> Result<wallets::Withdrawal, ServiceError> {
        self.repository
            .transition_withdrawal(id, "approved", "paid")
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::InvalidRequest(format!("Withdrawal {} is not approved.", id))
            })
    }

    async fn list_withdrawals(
        &self,
        user_id: &str,
    ) -> Result<Vec<wallets::Withdrawal>, ServiceError> {
        self.repository
            .list_withdrawals(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }
}

#[async_trait]
impl RequestHandler<WalletRequest> for WalletRequestHandler {
    async fn handle_request(&self, request: WalletRequest) {
        match request {
            WalletRequest::GetWallets { user_id, response } => {
                let wallets = self.get_wallets(&user_id).await;
                let _ = response.send(wallets);
            }
            WalletRequest::RequestWithdrawal { new, response } => {
                let withdrawal = self.request_withdrawal(new).await;
                let _ = response.send(withdrawal);
            }
            WalletRequest::ReviewWithdrawal {
                id,
                approve,
                response,
            } => {
                let withdrawal = self.review_withdrawal(&id, approve).await;
                let _ = response.send(withdrawal);
            }
            WalletRequest::MarkWithdrawalPaid { id, response } => {
                let withdrawal = self.mark_withdrawal_paid(&id).await;
                let _ = response.send(withdrawal);
            }
            WalletRequest::ListWithdrawals { user_id, response } => {
                let withdrawals = self.list_withdrawals(&user_id).await;
                let _ = response.send(withdrawals);
            }
        }
    }
}

/// Request-time rules. The balance and cooldown checks repeat inside the
/// repository's guarded debit, which stays authoritative under concurrent
/// requests.
pub fn check_withdrawal(
    wallet: &wallets::Wallet,
    amount_in_cents: i64,
    min_amount_in_cents: i64,
    cooldown_secs: i64,
    now: chrono::NaiveDateTime,
) -> Result<(), &'static str> {
    if amount_in_cents < min_amount_in_cents {
        return Err("Amount is below the withdrawal minimum.");
    }

    if amount_in_cents > wallet.balance_in_cents {
        return Err("Insufficient balance.");
    }

    if let Some(last) = wallet.last_withdrawal_at {
        if (now - last).num_seconds() < cooldown_secs {
            return Err("Withdrawal cooldown has not elapsed.");
        }
    }

    Ok(())
}

pub struct WalletService;

impl WalletService {
    pub fn new() -> Self {
        WalletService {}
    }
}

#[async_trait]
impl Service<WalletRequest, WalletRequestHandler> for WalletService {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn wallet(balance: i64, last_withdrawal_secs_ago: Option<i64>) -> wallets::Wallet {
        let now = chrono::Utc::now().naive_utc();

        wallets::Wallet {
            user_id: "user-1".to_string(),
            currency: "BRL".to_string(),
            balance_in_cents: balance,
            last_withdrawal_at: last_withdrawal_secs_ago.map(|s| now - Duration::seconds(s)),
        }
    }

    const MIN: i64 = 1_000;
    const COOLDOWN: i64 = 86_400;

    #[test]
    fn accepts_a_valid_withdrawal() {
        let now = chrono::Utc::now().naive_utc();
        let w = wallet(50_000, None);

        assert!(check_withdrawal(&w, 2_000, MIN, COOLDOWN, now).is_ok());
    }

    #[test]
    fn rejects_below_minimum() {
        let now = chrono::Utc::now().naive_utc();
        let w = wallet(50_000, None);

        assert!(check_withdrawal(&w, 999, MIN, COOLDOWN, now).is_err());
    }

    #[test]
    fn rejects_over_balance() {
        let now = chrono::Utc::now().naive_utc();
        let w = wallet(1_500, None);

        assert!(check_withdrawal(&w, 2_000, MIN, COOLDOWN, now).is_err());
    }

    #[test]
    fn enforces_cooldown_window() {
        let now = chrono::Utc::now().naive_utc();

        let recent = wallet(50_000, Some(3_600));
        assert!(check_withdrawal(&recent, 2_000, MIN, COOLDOWN, now).is_err());

        let old = wallet(50_000, Some(COOLDOWN + 1));
        assert!(check_withdrawal(&old, 2_000, MIN, COOLDOWN, now).is_ok());
    }
}
