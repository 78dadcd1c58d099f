//! 环节注册表
//!
//! 环节顺序、角色归属与合法转换集合的静态定义。纯查询，无副作用；
//! 全部为进程级不可变数据，可被并发读取。

use clinic_core::{StaffRole, VisitStage};

/// 队列看板展示的六个运营环节
///
/// `returned_to_front_desk` 在排队口径上归并回前台，`completed` 不参与排队。
pub const OPERATIONAL_STAGES: [VisitStage; 6] = [
    VisitStage::FrontDesk,
    VisitStage::Nurse,
    VisitStage::Doctor,
    VisitStage::Lab,
    VisitStage::Pharmacy,
    VisitStage::Billing,
];

/// 标准流程的下一环节（仅用于界面提示，不做强制约束）
pub fn next_stage(current: VisitStage) -> Option<VisitStage> {
    match current {
        VisitStage::FrontDesk => Some(VisitStage::Nurse),
        VisitStage::Nurse => Some(VisitStage::Doctor),
        VisitStage::Doctor => Some(VisitStage::Lab),
        VisitStage::Lab => Some(VisitStage::Pharmacy),
        VisitStage::Pharmacy => Some(VisitStage::Billing),
        VisitStage::Billing => Some(VisitStage::ReturnedToFrontDesk),
        VisitStage::ReturnedToFrontDesk => None,
        VisitStage::Completed => None,
    }
}

/// 环节转换有向图
///
/// 真实诊疗流程并非严格流水线：医生可把患者转回护士站补录体征、
/// 送检验科或直接送收费处。此处为完整的可达集合定义。
pub fn allowed_transitions(current: VisitStage) -> &'static [VisitStage] {
    match current {
        VisitStage::FrontDesk => &[
            VisitStage::Nurse,
            VisitStage::Doctor,
            VisitStage::ReturnedToFrontDesk,
        ],
        VisitStage::Nurse => &[
            VisitStage::Doctor,
            VisitStage::Lab,
            VisitStage::ReturnedToFrontDesk,
        ],
        VisitStage::Doctor => &[
            VisitStage::Nurse,
            VisitStage::Lab,
            VisitStage::Pharmacy,
            VisitStage::Billing,
            VisitStage::ReturnedToFrontDesk,
        ],
        VisitStage::Lab => &[
            VisitStage::Doctor,
            VisitStage::Pharmacy,
            VisitStage::Billing,
            VisitStage::ReturnedToFrontDesk,
        ],
        VisitStage::Pharmacy => &[
            VisitStage::Billing,
            VisitStage::Doctor,
            VisitStage::ReturnedToFrontDesk,
        ],
        VisitStage::Billing => &[VisitStage::ReturnedToFrontDesk, VisitStage::Pharmacy],
        // 返回前台后只能走最终结账，completed 为终态
        VisitStage::ReturnedToFrontDesk => &[],
        VisitStage::Completed => &[],
    }
}

/// 检查转换是否合法
pub fn can_transition(from: VisitStage, to: VisitStage) -> bool {
    allowed_transitions(from).contains(&to)
}

/// 各环节允许打卡的角色（管理员隐式拥有全部环节权限）
pub fn required_roles(stage: VisitStage) -> &'static [StaffRole] {
    match stage {
        VisitStage::FrontDesk | VisitStage::ReturnedToFrontDesk => &[StaffRole::Receptionist],
        VisitStage::Nurse => &[StaffRole::Nurse],
        VisitStage::Doctor => &[StaffRole::Doctor],
        VisitStage::Lab => &[StaffRole::LabTechnician],
        VisitStage::Pharmacy => &[StaffRole::Pharmacist],
        VisitStage::Billing => &[StaffRole::Cashier],
        VisitStage::Completed => &[],
    }
}

/// 看板展示名称
pub fn display_label(stage: VisitStage) -> &'static str {
    match stage {
        VisitStage::FrontDesk => "Front Desk",
        VisitStage::Nurse => "Nurse Station",
        VisitStage::Doctor => "Consultation",
        VisitStage::Lab => "Laboratory",
        VisitStage::Pharmacy => "Pharmacy",
        VisitStage::Billing => "Billing",
        VisitStage::ReturnedToFrontDesk => "Returned to Front Desk",
        VisitStage::Completed => "Completed",
    }
}

/// 看板徽章样式
pub fn badge_severity(stage: VisitStage) -> &'static str {
    match stage {
        VisitStage::FrontDesk | VisitStage::ReturnedToFrontDesk => "info",
        VisitStage::Nurse => "primary",
        VisitStage::Doctor => "warning",
        VisitStage::Lab => "secondary",
        VisitStage::Pharmacy => "success",
        VisitStage::Billing => "danger",
        VisitStage::Completed => "dark",
    }
}

/// 排队口径下的环节归属
///
/// 返回前台的患者在运营上仍处于前台队列。
pub fn queue_key(stage: VisitStage) -> VisitStage {
    match stage {
        VisitStage::ReturnedToFrontDesk => VisitStage::FrontDesk,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_chain() {
        let mut stage = VisitStage::FrontDesk;
        let mut path = vec![stage];
        while let Some(next) = next_stage(stage) {
            path.push(next);
            stage = next;
        }
        assert_eq!(
            path,
            vec![
                VisitStage::FrontDesk,
                VisitStage::Nurse,
                VisitStage::Doctor,
                VisitStage::Lab,
                VisitStage::Pharmacy,
                VisitStage::Billing,
                VisitStage::ReturnedToFrontDesk,
            ]
        );
    }

    #[test]
    fn test_next_stage_is_always_allowed() {
        for stage in VisitStage::all() {
            if let Some(next) = next_stage(*stage) {
                assert!(
                    can_transition(*stage, next),
                    "happy path {} -> {} missing from transition table",
                    stage,
                    next
                );
            }
        }
    }

    #[test]
    fn test_doctor_back_and_forth() {
        assert!(can_transition(VisitStage::Doctor, VisitStage::Nurse));
        assert!(can_transition(VisitStage::Doctor, VisitStage::Lab));
        assert!(can_transition(VisitStage::Lab, VisitStage::Doctor));
        assert!(!can_transition(VisitStage::Nurse, VisitStage::Pharmacy));
    }

    #[test]
    fn test_terminal_stages_have_no_transitions() {
        assert!(allowed_transitions(VisitStage::Completed).is_empty());
        assert!(allowed_transitions(VisitStage::ReturnedToFrontDesk).is_empty());
    }

    #[test]
    fn test_no_transition_targets_completed() {
        // completed 只能经最终结账进入，不出现在任何转换集合里
        for stage in VisitStage::all() {
            assert!(!can_transition(*stage, VisitStage::Completed));
        }
    }

    #[test]
    fn test_queue_key_aliases_returned_to_front_desk() {
        assert_eq!(
            queue_key(VisitStage::ReturnedToFrontDesk),
            VisitStage::FrontDesk
        );
        assert_eq!(queue_key(VisitStage::Doctor), VisitStage::Doctor);
    }

    #[test]
    fn test_required_roles() {
        assert_eq!(required_roles(VisitStage::Doctor), &[StaffRole::Doctor]);
        assert_eq!(
            required_roles(VisitStage::ReturnedToFrontDesk),
            &[StaffRole::Receptionist]
        );
        assert!(required_roles(VisitStage::Completed).is_empty());
    }
}
