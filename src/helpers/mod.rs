pub(crate) mod aggregate;
pub(crate) mod csv;
pub(crate) mod fanout;
pub(crate) mod fields;
pub(crate) mod filter;
pub(crate) mod types;

pub use fields::Computed;
pub use types::{DEFAULT_DATE_FORMAT, parse_bool};
