pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod media_client;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod security;
pub mod startup;
pub mod telemetry;
pub mod users;
pub mod validators;
