//! # session-auth-api
//!
//! Shared API types for the session-auth service.
//! This crate is designed to be WASM-compatible and can be used in both
//! backend (Rust) and frontend (WASM/TypeScript via wasm-bindgen) applications.
//!
//! ## Features
//!
//! - Request DTOs (`LoginRequest`, `CreateUserRequest`, etc.)
//! - Response DTOs (`LoginResponse`, `SessionStatusResponse`, etc.)
//! - Error response format with machine-readable flags (`ErrorResponse`)
//! - Generic response wrapper (`AppResponse`)
//!
//! ## Example
//!
//! ```rust
//! use session_auth_api::LoginRequest;
//!
//! let request = LoginRequest {
//!     email: "student@example.com".to_string(),
//!     password: "password123".to_string(),
//!     device_fingerprint: None,
//! };
//! ```

pub mod error;
pub mod requests;
pub mod responses;
pub mod result;

// Re-exports for convenient access
pub use error::{ErrorFlags, ErrorResponse};
pub use requests::*;
pub use responses::*;
pub use result::{AppResponse, StatusCode};
