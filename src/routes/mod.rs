mod auth;
mod health_check;

pub use auth::refresh;
pub use health_check::health_check;
