pub mod admission;
pub mod auth;

pub use admission::admission_middleware;
pub use auth::auth_middleware;
