pub mod jwt_decode;
pub mod snapshot;
