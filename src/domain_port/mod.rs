mod clock;
mod revocation_store;
mod user_provider;

pub use clock::*;
pub use revocation_store::*;
pub use user_provider::*;
