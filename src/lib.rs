pub mod api;
pub mod config;
pub mod health;
pub mod markup;
pub mod runtime;
pub mod state;
pub mod tools;
pub mod transcript;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
