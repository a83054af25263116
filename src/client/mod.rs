pub mod coinos;
pub mod lnurl;
pub mod relay;
pub mod zap;

pub use coinos::{CoinosClient, LedgerSource, DEFAULT_COINOS_API_URL};
pub use lnurl::LightningAddress;
pub use relay::{default_relays, RelayPool, RelayTransport};
pub use zap::get_zap_invoice;
