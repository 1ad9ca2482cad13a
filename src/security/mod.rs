pub mod authorization;
pub mod rate_limit;

pub use authorization::{AuthorizedUser, Authorizer, UsersFileAuthorizer};
pub use rate_limit::{ActionKind, RateLimited, RateLimiter, RatePolicy};
