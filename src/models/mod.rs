pub mod event;
pub mod ledger;
pub mod lnurl;
pub mod verdict;

pub use event::*;
pub use ledger::*;
pub use lnurl::*;
pub use verdict::*;
