//! fiscal-service library: fiscal obligation tracking, tax apuration
//! ledger, DIFAL computation, NFS-e issuance and Bloco K generation.
pub mod fiscal;
pub mod handlers;
pub mod models;
pub mod services;
