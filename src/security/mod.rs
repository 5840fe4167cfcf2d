pub mod clock;
pub mod password_grant;
pub mod token_cache;

pub use clock::{Clock, MockClock, SystemClock};
pub use password_grant::{validate_auth_response, PasswordGrantClient};
pub use token_cache::{AccessToken, Authenticator, IssuedToken, TokenCache};
