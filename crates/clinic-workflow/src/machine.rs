//! 就诊状态机
//!
//! 单条就诊记录的生命周期裁决：签到、交接、最终结账与管理员纠错。
//! 全部为对 `&mut Visit` 的纯转换函数，由存储层的原子更新闭包调用；
//! 成功的转换可能产出一个转换事件，交由副作用编排器在提交后处理。

use chrono::{DateTime, Utc};
use clinic_core::{ClinicError, Result, Visit, VisitStage, VisitStatus};
use serde_json::Value;
use uuid::Uuid;

use crate::stages;

/// 状态机转换事件
///
/// 在存储提交之后派发，事件处理失败不回滚转换本身。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEvent {
    /// 就诊进入医生诊室（挂号费开单触发点）
    DoctorEntered { visit_id: Uuid, branch_id: Uuid },
    /// 最终结账完成（预约完结与住院自动出院触发点）
    VisitCheckedOut {
        visit_id: Uuid,
        actor_id: Uuid,
        appointment_id: Option<Uuid>,
        admission_id: Option<Uuid>,
    },
}

fn ensure_in_progress(visit: &Visit) -> Result<()> {
    match visit.status {
        VisitStatus::InProgress => Ok(()),
        VisitStatus::Completed => Err(ClinicError::InvalidState(format!(
            "visit {} 已完成",
            visit.id
        ))),
        VisitStatus::Cancelled => Err(ClinicError::InvalidState(format!(
            "visit {} 已取消",
            visit.id
        ))),
    }
}

/// 浅合并环节负载（对象按键合并，其余整体替换）
fn merge_payload(existing: &mut Option<Value>, incoming: Value) {
    match (existing.as_mut(), incoming) {
        (Some(Value::Object(current)), Value::Object(new)) => {
            for (k, v) in new {
                current.insert(k, v);
            }
        }
        (_, incoming) => *existing = Some(incoming),
    }
}

/// 环节签到
///
/// 只能在就诊当前停靠的环节签到，且该环节尚未签到过（除非经管理员重置）。
pub fn clock_in(
    visit: &mut Visit,
    stage: VisitStage,
    actor_id: Uuid,
    payload: Option<Value>,
    now: DateTime<Utc>,
) -> Result<Option<TransitionEvent>> {
    ensure_in_progress(visit)?;

    if visit.current_stage != stage {
        return Err(ClinicError::StageMismatch {
            expected: stage,
            actual: visit.current_stage,
        });
    }

    let clock = visit.stages.clock_mut(stage);
    if clock.is_clocked_in() {
        return Err(ClinicError::AlreadyClockedIn { stage });
    }

    clock.clocked_in_by = Some(actor_id);
    clock.clocked_in_at = Some(now);
    if let Some(payload) = payload {
        merge_payload(&mut clock.payload, payload);
    }

    let event = (stage == VisitStage::Doctor).then(|| TransitionEvent::DoctorEntered {
        visit_id: visit.id,
        branch_id: visit.branch_id,
    });
    Ok(event)
}

/// 环节交接
///
/// `current_stage` 唯一的合法变更入口（最终结账除外）。目标环节必须
/// 在转换图中从当前环节可达；原环节如已签到且未签出则顺带签出。
pub fn handoff(
    visit: &mut Visit,
    from: VisitStage,
    to: VisitStage,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<TransitionEvent>> {
    ensure_in_progress(visit)?;

    if visit.current_stage != from {
        return Err(ClinicError::StageMismatch {
            expected: from,
            actual: visit.current_stage,
        });
    }

    if !stages::can_transition(from, to) {
        return Err(ClinicError::IllegalTransition { from, to });
    }

    let clock = visit.stages.clock_mut(from);
    if clock.clocked_in_at.is_some() && clock.clocked_out_at.is_none() {
        clock.clocked_out_by = Some(actor_id);
        clock.clocked_out_at = Some(now);
    }

    visit.current_stage = to;

    // 首次送达医生诊室即触发挂号费开单；开单自身幂等，重复派发无害
    let event = (to == VisitStage::Doctor && !visit.stages.doctor.is_clocked_in()).then(|| {
        TransitionEvent::DoctorEntered {
            visit_id: visit.id,
            branch_id: visit.branch_id,
        }
    });
    Ok(event)
}

/// 最终结账
///
/// 仅当就诊停在"返回前台"环节时可达，置为终态并记录结账人。
pub fn final_checkout(
    visit: &mut Visit,
    actor_id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<Option<TransitionEvent>> {
    if visit.is_terminal() {
        return Err(ClinicError::AlreadyCompleted(format!(
            "visit {}",
            visit.id
        )));
    }

    if visit.current_stage != VisitStage::ReturnedToFrontDesk {
        return Err(ClinicError::WrongStage {
            current: visit.current_stage,
        });
    }

    let clock = visit.stages.clock_mut(VisitStage::ReturnedToFrontDesk);
    if clock.clocked_in_at.is_some() && clock.clocked_out_at.is_none() {
        clock.clocked_out_by = Some(actor_id);
        clock.clocked_out_at = Some(now);
    }

    visit.status = VisitStatus::Completed;
    visit.current_stage = VisitStage::Completed;
    visit.final_clock_out = Some(clinic_core::FinalClockOut {
        by: actor_id,
        at: now,
        notes,
    });

    Ok(Some(TransitionEvent::VisitCheckedOut {
        visit_id: visit.id,
        actor_id,
        appointment_id: visit.appointment_id,
        admission_id: visit.admission_id,
    }))
}

/// 管理员环节重置
///
/// 清空单个环节的打卡字段以纠正误操作，不改变 `current_stage` 与状态；
/// 终态就诊不可重置。
pub fn admin_reset_stage(visit: &mut Visit, stage: VisitStage) -> Result<()> {
    if visit.is_terminal() {
        return Err(ClinicError::InvalidState(format!(
            "visit {} 已终结，不可重置",
            visit.id
        )));
    }

    visit.stages.clock_mut(stage).reset();
    Ok(())
}
