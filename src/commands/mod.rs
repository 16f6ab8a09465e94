pub mod admin;
pub mod general;
pub mod whitelist;

pub use admin::whitelist_reset;
pub use general::{help, ping};
pub use whitelist::{whitelist, whitelist_restart};
