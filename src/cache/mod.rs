pub mod wallet_cache;

pub use wallet_cache::{CacheStats, WalletCache};
