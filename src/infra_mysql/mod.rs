mod revocation_store_mysql;
mod user_provider_mysql;

pub use revocation_store_mysql::*;
pub use user_provider_mysql::*;

mod util;
