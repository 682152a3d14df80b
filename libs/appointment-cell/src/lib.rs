pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

pub use models::*;
pub use services::*;
