pub mod dates;
pub mod error;
pub mod extract;
