//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 就诊环节
///
/// 患者在诊所内流转经过的各个科室环节，固定有序集合。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitStage {
    FrontDesk,           // 前台
    Nurse,               // 护士站
    Doctor,              // 医生诊室
    Lab,                 // 检验科
    Pharmacy,            // 药房
    Billing,             // 收费处
    ReturnedToFrontDesk, // 返回前台
    Completed,           // 已完成
}

impl VisitStage {
    /// 按固定枚举顺序返回全部环节
    pub fn all() -> &'static [VisitStage] {
        &[
            VisitStage::FrontDesk,
            VisitStage::Nurse,
            VisitStage::Doctor,
            VisitStage::Lab,
            VisitStage::Pharmacy,
            VisitStage::Billing,
            VisitStage::ReturnedToFrontDesk,
            VisitStage::Completed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStage::FrontDesk => "front_desk",
            VisitStage::Nurse => "nurse",
            VisitStage::Doctor => "doctor",
            VisitStage::Lab => "lab",
            VisitStage::Pharmacy => "pharmacy",
            VisitStage::Billing => "billing",
            VisitStage::ReturnedToFrontDesk => "returned_to_front_desk",
            VisitStage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for VisitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VisitStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "front_desk" => Ok(VisitStage::FrontDesk),
            "nurse" => Ok(VisitStage::Nurse),
            "doctor" => Ok(VisitStage::Doctor),
            "lab" => Ok(VisitStage::Lab),
            "pharmacy" => Ok(VisitStage::Pharmacy),
            "billing" => Ok(VisitStage::Billing),
            "returned_to_front_desk" => Ok(VisitStage::ReturnedToFrontDesk),
            "completed" => Ok(VisitStage::Completed),
            _ => Err(format!("unknown visit stage: {}", s)),
        }
    }
}

/// 就诊状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    InProgress, // 就诊中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

/// 员工角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// 管理员 - 全部环节权限
    Admin,
    /// 前台接待
    Receptionist,
    /// 护士
    Nurse,
    /// 医生
    Doctor,
    /// 检验技师
    LabTechnician,
    /// 药师
    Pharmacist,
    /// 收费员
    Cashier,
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(StaffRole::Admin),
            "receptionist" => Ok(StaffRole::Receptionist),
            "nurse" => Ok(StaffRole::Nurse),
            "doctor" => Ok(StaffRole::Doctor),
            "lab_technician" => Ok(StaffRole::LabTechnician),
            "pharmacist" => Ok(StaffRole::Pharmacist),
            "cashier" => Ok(StaffRole::Cashier),
            _ => Err(format!("unknown staff role: {}", s)),
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StaffRole::Admin => "admin",
            StaffRole::Receptionist => "receptionist",
            StaffRole::Nurse => "nurse",
            StaffRole::Doctor => "doctor",
            StaffRole::LabTechnician => "lab_technician",
            StaffRole::Pharmacist => "pharmacist",
            StaffRole::Cashier => "cashier",
        };
        f.write_str(s)
    }
}

/// 单个环节的打卡记录
///
/// 签到/签出各记录操作人与时间，payload 承载环节特有数据（如护士站的生命体征）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageClock {
    pub clocked_in_by: Option<Uuid>,
    pub clocked_in_at: Option<DateTime<Utc>>,
    pub clocked_out_by: Option<Uuid>,
    pub clocked_out_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
}

impl StageClock {
    pub fn is_clocked_in(&self) -> bool {
        self.clocked_in_at.is_some()
    }

    /// 清空全部打卡字段（管理员纠错用）
    pub fn reset(&mut self) {
        *self = StageClock::default();
    }
}

/// 全部环节的打卡记录
///
/// 每个环节一个固定槽位，按枚举索引，编译期保证覆盖完整环节集合。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageClocks {
    pub front_desk: StageClock,
    pub nurse: StageClock,
    pub doctor: StageClock,
    pub lab: StageClock,
    pub pharmacy: StageClock,
    pub billing: StageClock,
    pub returned_to_front_desk: StageClock,
    pub completed: StageClock,
}

impl StageClocks {
    pub fn clock(&self, stage: VisitStage) -> &StageClock {
        match stage {
            VisitStage::FrontDesk => &self.front_desk,
            VisitStage::Nurse => &self.nurse,
            VisitStage::Doctor => &self.doctor,
            VisitStage::Lab => &self.lab,
            VisitStage::Pharmacy => &self.pharmacy,
            VisitStage::Billing => &self.billing,
            VisitStage::ReturnedToFrontDesk => &self.returned_to_front_desk,
            VisitStage::Completed => &self.completed,
        }
    }

    pub fn clock_mut(&mut self, stage: VisitStage) -> &mut StageClock {
        match stage {
            VisitStage::FrontDesk => &mut self.front_desk,
            VisitStage::Nurse => &mut self.nurse,
            VisitStage::Doctor => &mut self.doctor,
            VisitStage::Lab => &mut self.lab,
            VisitStage::Pharmacy => &mut self.pharmacy,
            VisitStage::Billing => &mut self.billing,
            VisitStage::ReturnedToFrontDesk => &mut self.returned_to_front_desk,
            VisitStage::Completed => &mut self.completed,
        }
    }
}

/// 最终结账记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalClockOut {
    pub by: Uuid,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// 就诊记录
///
/// 患者当日就诊流转的唯一事实来源，所有变更均通过状态机操作完成。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub branch_id: Uuid, // 院区（多租户隔离单位）
    pub status: VisitStatus,
    pub current_stage: VisitStage,
    pub stages: StageClocks,
    pub final_clock_out: Option<FinalClockOut>,
    pub admission_id: Option<Uuid>,   // 关联住院记录
    pub appointment_id: Option<Uuid>, // 关联预约
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// 前台签入时创建，初始环节为前台
    pub fn new(patient_id: Uuid, branch_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            branch_id,
            status: VisitStatus::InProgress,
            current_stage: VisitStage::FrontDesk,
            stages: StageClocks::default(),
            final_clock_out: None,
            admission_id: None,
            appointment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 终态就诊不允许任何环节变更
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, VisitStatus::Completed | VisitStatus::Cancelled)
    }
}

/// 操作人上下文
///
/// 由上游身份服务提供并经网关注入，本核心直接信任，不做凭证校验。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub role: StaffRole,
    pub branch_id: Uuid,
}
