pub mod catalog_api;
pub mod error;
pub mod mcp_api;
pub mod redis;
pub mod storage;
