use rpc_fleet_core::PublicKey;
use std::sync::Arc;

/// Opaque reference-table data (C7's unit of lookup).
///
/// The core only ever needs address identity, membership testing, the
/// unique-account count used to order `allTables`, and a serialization
/// round-trip for the on-disk partition cache — it never interprets the
/// table's contents.
pub trait LookupTable: Send + Sync + Sized + 'static {
    type DeserializeError: std::error::Error + Send + Sync + 'static;

    fn address(&self) -> PublicKey;
    fn contains(&self, account: &PublicKey) -> bool;
    fn num_unique_accounts(&self) -> u32;

    fn serialize(&self) -> Vec<u8>;
    fn deserialize(address: PublicKey, data: &[u8]) -> Result<Self, Self::DeserializeError>;
}

/// A table paired with its score against a specific query's account set,
/// ordered by descending score (ties broken by original, stable order).
pub type ScoredTable<T> = (u32, Arc<T>);

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::convert::Infallible;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FakeTable {
        pub address: PublicKey,
        pub accounts: Vec<PublicKey>,
    }

    impl LookupTable for FakeTable {
        type DeserializeError = Infallible;

        fn address(&self) -> PublicKey {
            self.address
        }

        fn contains(&self, account: &PublicKey) -> bool {
            self.accounts.contains(account)
        }

        fn num_unique_accounts(&self) -> u32 {
            self.accounts.len() as u32
        }

        fn serialize(&self) -> Vec<u8> {
            let mut buf = Vec::with_capacity(4 + self.accounts.len() * 32);
            buf.extend_from_slice(&(self.accounts.len() as u32).to_le_bytes());
            for account in &self.accounts {
                buf.extend_from_slice(&account.0);
            }
            buf
        }

        fn deserialize(address: PublicKey, data: &[u8]) -> Result<Self, Self::DeserializeError> {
            let count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
            let mut accounts = Vec::with_capacity(count);
            for i in 0..count {
                let start = 4 + i * 32;
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&data[start..start + 32]);
                accounts.push(PublicKey(bytes));
            }
            Ok(FakeTable { address, accounts })
        }
    }

    pub fn key(byte: u8) -> PublicKey {
        PublicKey([byte; 32])
    }
}
