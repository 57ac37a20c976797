//! # Axion Auth
//!
//! Token types and signing utilities for the Axion service.
//!
//! This crate provides:
//!
//! - [`claims`]: the claim set shared by access and refresh tokens
//! - [`keyring`]: parsing of the `kid:secret` signing key ring
//! - [`jwt`]: [`TokenService`], which creates, verifies, and inspects tokens
//!
//! # Token Types
//!
//! - **Access token**: signed with the active ring key, kid in the header
//! - **Refresh token**: signed with the refresh secret, backed by a server-side session
//!
//! Verification failures are returned as [`VerifyError`] values; signing
//! failures as [`TokenError`].

pub mod claims;
pub mod error;
pub mod jwt;
pub mod keyring;

pub use claims::{
    IssuedToken, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH, TokenClaims, TokenMeta, TokenSubject,
};
pub use error::{TokenError, VerifyError};
pub use jwt::TokenService;
pub use keyring::{FALLBACK_KID, KeyRing, SigningKey, build_key_ring};
