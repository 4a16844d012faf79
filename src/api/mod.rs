/*
 * Responsibility
 * - HTTP 公開面 (routes() の re-export など)
 */
pub mod dto;
pub mod handlers;
mod routes;

pub use routes::routes;
