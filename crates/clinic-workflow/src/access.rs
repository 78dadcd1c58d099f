//! 访问控制闸门
//!
//! 角色到环节权限的唯一裁决点，在状态机之前执行；状态机本身不做任何
//! 角色判断。授权失败返回 `Forbidden`，与状态机的合法性错误严格区分。

use clinic_core::{ClinicError, Result, StaffRole, VisitStage};
use tracing::warn;

use crate::stages;

/// 判定角色是否可在指定环节执行打卡/交接操作
pub fn authorize_stage(role: StaffRole, stage: VisitStage) -> Result<()> {
    if role == StaffRole::Admin || stages::required_roles(stage).contains(&role) {
        return Ok(());
    }

    warn!("Role {} denied for stage {}", role, stage);
    Err(ClinicError::Forbidden(format!(
        "角色 {} 无权操作环节 {}",
        role, stage
    )))
}

/// 仅限管理员的操作（环节纠错重置）
pub fn authorize_admin(role: StaffRole) -> Result<()> {
    if role == StaffRole::Admin {
        Ok(())
    } else {
        warn!("Role {} denied for admin-only operation", role);
        Err(ClinicError::Forbidden(format!(
            "角色 {} 无管理员权限",
            role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_matches_stage() {
        assert!(authorize_stage(StaffRole::Doctor, VisitStage::Doctor).is_ok());
        assert!(authorize_stage(StaffRole::Nurse, VisitStage::Nurse).is_ok());
        assert!(authorize_stage(StaffRole::Receptionist, VisitStage::FrontDesk).is_ok());
        assert!(
            authorize_stage(StaffRole::Receptionist, VisitStage::ReturnedToFrontDesk).is_ok()
        );
    }

    #[test]
    fn test_role_mismatch_is_forbidden() {
        let err = authorize_stage(StaffRole::Nurse, VisitStage::Doctor).unwrap_err();
        assert!(matches!(err, ClinicError::Forbidden(_)));

        let err = authorize_stage(StaffRole::Cashier, VisitStage::Lab).unwrap_err();
        assert!(matches!(err, ClinicError::Forbidden(_)));
    }

    #[test]
    fn test_admin_allowed_everywhere() {
        for stage in VisitStage::all() {
            if *stage == VisitStage::Completed {
                continue;
            }
            assert!(authorize_stage(StaffRole::Admin, *stage).is_ok());
        }
        assert!(authorize_admin(StaffRole::Admin).is_ok());
    }

    #[test]
    fn test_non_admin_cannot_reset() {
        assert!(matches!(
            authorize_admin(StaffRole::Doctor).unwrap_err(),
            ClinicError::Forbidden(_)
        ));
    }
}
