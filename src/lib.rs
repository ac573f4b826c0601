pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schemas;
pub mod services;
pub mod state;
pub mod tenancy;

#[cfg(test)]
mod testing;
