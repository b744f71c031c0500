//! Visibility expressions and the authorization sets that satisfy them.

mod authorizations;
mod visibility;

pub use authorizations::Authorizations;
pub use visibility::Visibility;
