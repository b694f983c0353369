pub mod admin;
pub mod ask;
pub mod liveness;
