//! 就诊流转引擎
//!
//! 协调访问控制、状态机、存储与副作用编排的统一入口。每个变更操作
//! 的固定次序：闸门鉴权 -> 原子读改写 -> 提交后派发副作用。

use chrono::Utc;
use clinic_core::{ActorContext, Result, Visit, VisitStage};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::access;
use crate::effects::SideEffectOrchestrator;
use crate::machine;
use crate::queue::{self, QueueSnapshot};
use crate::services::CollaboratorServices;
use crate::store::VisitStore;

/// 变更操作的返回：更新后的就诊与副作用降级警告
#[derive(Debug, Clone)]
pub struct VisitOutcome {
    pub visit: Visit,
    pub warnings: Vec<String>,
}

/// 就诊流转引擎
pub struct WorkflowEngine {
    store: VisitStore,
    orchestrator: SideEffectOrchestrator,
}

impl WorkflowEngine {
    pub fn new(services: CollaboratorServices) -> Self {
        Self {
            store: VisitStore::new(),
            orchestrator: SideEffectOrchestrator::new(services),
        }
    }

    pub fn with_orchestrator(store: VisitStore, orchestrator: SideEffectOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    pub fn store(&self) -> &VisitStore {
        &self.store
    }

    /// 前台签入，创建停靠在前台环节的新就诊
    pub async fn create_visit(
        &self,
        ctx: &ActorContext,
        patient_id: Uuid,
        appointment_id: Option<Uuid>,
        admission_id: Option<Uuid>,
    ) -> Result<Visit> {
        access::authorize_stage(ctx.role, VisitStage::FrontDesk)?;

        let visit = self
            .store
            .create_visit(patient_id, ctx.branch_id, appointment_id, admission_id)
            .await;
        info!("Visit {} checked in at front desk by {}", visit.id, ctx.actor_id);
        Ok(visit)
    }

    pub async fn get_visit(&self, visit_id: Uuid) -> Result<Visit> {
        self.store.get(visit_id).await
    }

    /// 环节签到
    pub async fn clock_in(
        &self,
        ctx: &ActorContext,
        visit_id: Uuid,
        stage: VisitStage,
        payload: Option<Value>,
    ) -> Result<VisitOutcome> {
        access::authorize_stage(ctx.role, stage)?;

        let actor_id = ctx.actor_id;
        let now = Utc::now();
        let (visit, event) = self
            .store
            .update_atomic(visit_id, |visit| {
                machine::clock_in(visit, stage, actor_id, payload, now)
            })
            .await?;

        info!("Visit {} clocked in at {} by {}", visit_id, stage, actor_id);
        let warnings = self.run_effects(event).await;
        Ok(VisitOutcome { visit, warnings })
    }

    /// 环节交接
    pub async fn handoff(
        &self,
        ctx: &ActorContext,
        visit_id: Uuid,
        from: VisitStage,
        to: VisitStage,
    ) -> Result<VisitOutcome> {
        // 交接由原环节的工作人员发起，按原环节鉴权
        access::authorize_stage(ctx.role, from)?;

        let actor_id = ctx.actor_id;
        let now = Utc::now();
        let (visit, event) = self
            .store
            .update_atomic(visit_id, |visit| {
                machine::handoff(visit, from, to, actor_id, now)
            })
            .await?;

        info!(
            "Visit {} handed off from {} to {} by {}",
            visit_id, from, to, actor_id
        );
        let warnings = self.run_effects(event).await;
        Ok(VisitOutcome { visit, warnings })
    }

    /// 最终结账
    pub async fn final_checkout(
        &self,
        ctx: &ActorContext,
        visit_id: Uuid,
        notes: Option<String>,
    ) -> Result<VisitOutcome> {
        access::authorize_stage(ctx.role, VisitStage::ReturnedToFrontDesk)?;

        let actor_id = ctx.actor_id;
        let now = Utc::now();
        let (visit, event) = self
            .store
            .update_atomic(visit_id, |visit| {
                machine::final_checkout(visit, actor_id, notes, now)
            })
            .await?;

        info!("Visit {} checked out by {}", visit_id, actor_id);
        let warnings = self.run_effects(event).await;
        Ok(VisitOutcome { visit, warnings })
    }

    /// 管理员环节重置
    pub async fn admin_reset_stage(
        &self,
        ctx: &ActorContext,
        visit_id: Uuid,
        stage: VisitStage,
    ) -> Result<Visit> {
        access::authorize_admin(ctx.role)?;

        let (visit, _) = self
            .store
            .update_atomic(visit_id, |visit| machine::admin_reset_stage(visit, stage))
            .await?;

        info!(
            "Visit {} stage {} reset by admin {}",
            visit_id, stage, ctx.actor_id
        );
        Ok(visit)
    }

    /// 实时队列快照（每次请求重新计算）
    pub async fn queue_snapshot(&self, branch_id: Option<Uuid>) -> QueueSnapshot {
        let visits = self.store.list_in_progress(branch_id).await;
        queue::queue_snapshot(&visits, Utc::now())
    }

    async fn run_effects(&self, event: Option<machine::TransitionEvent>) -> Vec<String> {
        match event {
            Some(event) => self.orchestrator.dispatch(&event).await,
            None => Vec::new(),
        }
    }
}
