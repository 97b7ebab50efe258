//! HTTP surface over the lending-position service.
//!
//! Endpoints:
//! - GET    /health
//! - GET    /api/position
//! - POST   /api/collaterals, PATCH/DELETE /api/collaterals/{id}, PUT /api/collaterals/{id}/{field}
//! - POST   /api/borrowed, DELETE /api/borrowed/{id}, PUT /api/borrowed/{id}/{field}
//! - PUT    /api/multiplier
//! - GET/PUT /api/price-sync

pub mod routes;
pub mod state;
