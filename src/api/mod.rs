//! # API Module
//!
//! This module provides the HTTP interface for the plan store.
//!
//! ## Endpoints Overview
//!
//! ### Plan Operations
//! - `POST /api/v1/plans` - Create plan (409 if the id exists)
//! - `GET /api/v1/plans` - List plan ids
//! - `GET /api/v1/plans/{id}` - Read plan; `If-None-Match` may yield 304
//! - `PUT /api/v1/plans/{id}` - Replace plan; requires `If-Match`
//! - `PATCH /api/v1/plans/{id}` - Merge-patch plan; requires `If-Match`
//! - `DELETE /api/v1/plans/{id}` - Delete plan; requires `If-Match`
//!
//! ### Admin
//! - `POST /api/v1/admin/orphans/collect` - Remove unreferenced child entities
//!
//! ### System
//! - `GET /health`, `GET /info`, `GET /metrics`

pub mod auth;
pub mod handlers;
pub mod response;
pub mod server;

// Re-export commonly used items
pub use response::{ApiError, ApiResponse, ErrorResponse};
pub use server::{create_app, start_server};
