pub mod create;
pub mod diag;
pub mod page;
pub mod status;
pub mod upload;
