// handlers/mod.rs - HTTP handlers
//
// Public:    GET /, GET /health
// Protected: /api/pages/* (bearer token, page permission on writes)

pub mod pages;
pub mod public;
