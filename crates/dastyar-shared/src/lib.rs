pub mod access;
pub mod constants;
pub mod error;
pub mod locale;
pub mod types;

pub use error::SharedError;
