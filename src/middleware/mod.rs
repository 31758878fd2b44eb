pub mod auth;
pub mod request_meta;

pub use auth::{bearer_auth_middleware, Actor};
pub use request_meta::RequestMeta;
