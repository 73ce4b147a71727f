pub mod documents;
pub mod payments;
pub mod referrals;
pub mod wallets;
