pub mod handler;
pub mod types;
pub mod validator;

pub use handler::*;
pub use types::*;
pub use validator::*;
