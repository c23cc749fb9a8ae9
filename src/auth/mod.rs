/// Authentication module
///
/// Credential signing/verification and the refresh token rotation service.

mod claims;
mod jwt;
mod rotation;

pub use claims::AccessClaims;
pub use claims::RenewalClaims;
pub use jwt::generate_access_token;
pub use jwt::generate_renewal_token;
pub use jwt::validate_access_token;
pub use jwt::validate_renewal_token;
pub use rotation::RenewalService;
pub use rotation::TokenPair;
