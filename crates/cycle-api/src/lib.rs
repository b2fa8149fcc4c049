pub mod auth;
pub mod config;
pub mod conversations;
pub mod ephemeral;
pub mod error;
pub mod extract;
pub mod form;
pub mod images;
pub mod mail;
pub mod middleware;
pub mod products;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;
