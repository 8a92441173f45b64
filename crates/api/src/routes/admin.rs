//! # 系统管理路由控制器（Admin 角色专属）

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use std::str::FromStr;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, CreateUserRequest, UserResponse};
use soba_core::store::port::{User, UserRole};

/// 创建新用户
///
/// 新用户首次登录后必须修改密码。
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    tag = "系统管理 (Admin)",
    security(("bearer_jwt" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<UserResponse>),
        (status = 400, description = "参数错误或用户已存在"),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::BadRequest("user id must not be empty".into()));
    }
    if state.system_store.get_user(&req.id).await?.is_some() {
        return Err(ApiError::BadRequest(format!("User {} already exists", req.id)));
    }

    let role = UserRole::from_str(&req.role).map_err(ApiError::BadRequest)?;
    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|_| ApiError::Internal("Failed to hash password".into()))?;

    let user = User {
        id: req.id,
        name: req.name,
        password_hash,
        role,
        force_password_change: true,
        created_at: Utc::now(),
    };
    state.system_store.save_user(&user).await?;

    tracing::info!("User {} created by admin", user.id);
    Ok(Json(ApiResponse::ok(UserResponse::from(&user))))
}
