// app/src/web/mod.rs

pub mod extractor;
pub mod handlers;
pub mod routes;

pub use extractor::AuthenticatedUser;
pub use routes::configure_app_routes;
