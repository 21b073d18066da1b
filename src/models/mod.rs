pub use account::*;
pub use allowance::*;
pub use api_response::*;
pub use bonus_pack::*;
pub use errors::*;
pub use ledger_entry::*;

pub mod account;
pub mod allowance;
pub mod api_response;
pub mod bonus_pack;
pub mod errors;
pub mod ledger_entry;
