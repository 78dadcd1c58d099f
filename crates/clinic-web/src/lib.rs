//! # Clinic Web
//!
//! 就诊流转系统的HTTP服务层：身份头解析、路由与错误映射。

pub mod context;
pub mod handlers;
pub mod server;

pub use server::WebServer;
