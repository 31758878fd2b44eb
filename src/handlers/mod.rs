pub mod auth;
pub mod clients;
pub mod employers;
pub mod prospects;
