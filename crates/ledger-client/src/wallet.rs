use async_trait::async_trait;

use crate::{Address, Error, TransactionDigest};

/// Funding side of the ledger.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Lists `count` addresses of an identity's account, starting at `address_index`.
    async fn get_addresses(
        &self,
        identity: &str,
        account_index: u32,
        address_index: u32,
        count: u32,
    ) -> Result<Vec<Address>, Error>;

    async fn transfer(
        &self,
        identity: &str,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<TransactionDigest, Error>;
}
