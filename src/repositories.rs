pub mod documents;
pub mod email;
pub mod ipfs;
pub mod payments;
pub mod referrals;
pub mod wallets;
