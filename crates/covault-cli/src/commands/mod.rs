//! Command handlers, one module per domain.

pub mod accounts;
pub mod admin;
pub mod files;
pub mod grants;
pub mod history;
pub mod init;
pub mod misc;
pub mod rotate;
