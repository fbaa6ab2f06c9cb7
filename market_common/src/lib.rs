mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{Money, MoneyError, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
