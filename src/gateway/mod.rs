//! API Gateway Integration
//!
//! Everything the portal knows about the external API gateway.
//!
//! ## Endpoints
//!
//! - `POST /api/users/login` - Credential exchange, returns a bearer token
//! - `POST /api/users/register` - Account creation
//! - `GET /api/users/properties` - Properties of the signed-in user
//! - `POST /api/users/register-property` - Register a new property
//! - `GET /api/recommendations/property/{id}` - Consumption report
//! - `POST /api/billing/ingest` - Submit a consumption reading
//!
//! The push channel (`/ws-notifications`) is handled by [`crate::feed`].

mod client;
mod dto;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{origin_of, push_url, GatewayApi, GatewayClient, GatewayError};
pub use dto::{
    parse_timestamp, IngestRequest, LoginRequest, LoginResponse, Property,
    RegisterPropertyRequest, RegisterRequest, ReportEntry, ReportStatus,
};
