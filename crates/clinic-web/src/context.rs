//! 操作人上下文注入
//!
//! 身份验证由上游网关完成，本服务只消费网关注入的身份头：
//! `x-actor-id` / `x-actor-role` / `x-branch-id`，解析后放入请求扩展。
//! 头缺失或格式非法一律 400，不做任何凭证校验。

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use clinic_core::{ActorContext, ClinicError, StaffRole};
use uuid::Uuid;

use crate::handlers::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const BRANCH_ID_HEADER: &str = "x-branch-id";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ClinicError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ClinicError::Validation(format!("缺少身份头 {}", name)))
}

/// 从请求头解析操作人上下文
pub fn actor_context_from_headers(headers: &HeaderMap) -> Result<ActorContext, ClinicError> {
    let actor_id: Uuid = header_value(headers, ACTOR_ID_HEADER)?
        .parse()
        .map_err(|_| ClinicError::Validation(format!("{} 不是合法的UUID", ACTOR_ID_HEADER)))?;

    let role: StaffRole = header_value(headers, ACTOR_ROLE_HEADER)?
        .parse()
        .map_err(|e| ClinicError::Validation(format!("{}: {}", ACTOR_ROLE_HEADER, e)))?;

    let branch_id: Uuid = header_value(headers, BRANCH_ID_HEADER)?
        .parse()
        .map_err(|_| ClinicError::Validation(format!("{} 不是合法的UUID", BRANCH_ID_HEADER)))?;

    Ok(ActorContext {
        actor_id,
        role,
        branch_id,
    })
}

/// 上下文中间件
pub async fn actor_context_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = actor_context_from_headers(request.headers())?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
