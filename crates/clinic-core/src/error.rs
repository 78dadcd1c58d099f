//! 错误定义模块

use thiserror::Error;

use crate::models::VisitStage;

/// 诊所系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的就诊状态: {0}")]
    InvalidState(String),

    #[error("就诊当前不在该环节: 期望 {expected}, 实际 {actual}")]
    StageMismatch {
        expected: VisitStage,
        actual: VisitStage,
    },

    #[error("不允许的环节转换: 从 {from} 到 {to}")]
    IllegalTransition { from: VisitStage, to: VisitStage },

    #[error("该环节已签到: {stage}")]
    AlreadyClockedIn { stage: VisitStage },

    #[error("就诊已完成，不可再操作: {0}")]
    AlreadyCompleted(String),

    #[error("就诊不在可结账环节: 当前 {current}")]
    WrongStage { current: VisitStage },

    #[error("权限不足: {0}")]
    Forbidden(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("上游服务不可用: {0}")]
    UpstreamUnavailable(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 诊所系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
