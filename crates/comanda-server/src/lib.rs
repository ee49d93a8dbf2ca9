//! REST API server: routes, cookie sessions, DTOs, the WhatsApp webhook, and OpenAPI docs.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
