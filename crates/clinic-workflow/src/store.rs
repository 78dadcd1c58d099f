//! 就诊记录存储
//!
//! 就诊记录是并发竞争的基本单位。所有变更走 `update_atomic`：
//! 在同一个写临界区内重读最新状态、校验前置条件、整体提交，
//! 避免并发交接之间的部分更新交错。

use chrono::Utc;
use clinic_core::{ClinicError, Result, Visit, VisitStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// 内存就诊存储
#[derive(Clone, Default)]
pub struct VisitStore {
    visits: Arc<RwLock<HashMap<Uuid, Visit>>>,
}

impl VisitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 前台签入：创建一条停在前台环节的新就诊
    pub async fn create_visit(
        &self,
        patient_id: Uuid,
        branch_id: Uuid,
        appointment_id: Option<Uuid>,
        admission_id: Option<Uuid>,
    ) -> Visit {
        let mut visit = Visit::new(patient_id, branch_id);
        visit.appointment_id = appointment_id;
        visit.admission_id = admission_id;

        let mut visits = self.visits.write().await;
        visits.insert(visit.id, visit.clone());
        debug!("Created visit {} for patient {}", visit.id, patient_id);
        visit
    }

    pub async fn insert(&self, visit: Visit) {
        self.visits.write().await.insert(visit.id, visit);
    }

    pub async fn get(&self, visit_id: Uuid) -> Result<Visit> {
        self.visits
            .read()
            .await
            .get(&visit_id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("visit {}", visit_id)))
    }

    /// 全部进行中的就诊，可按院区过滤（队列聚合的唯一输入）
    pub async fn list_in_progress(&self, branch_id: Option<Uuid>) -> Vec<Visit> {
        self.visits
            .read()
            .await
            .values()
            .filter(|v| v.status == VisitStatus::InProgress)
            .filter(|v| branch_id.map_or(true, |b| v.branch_id == b))
            .cloned()
            .collect()
    }

    /// 读取-校验-写入一体的原子更新
    ///
    /// 闭包在写锁内收到最新状态的副本，校验失败则不提交任何字段；
    /// 成功则整体替换记录。两个并发交接在此串行化，只有观察到
    /// 预期 `current_stage` 的那一个会成功。
    pub async fn update_atomic<F, T>(&self, visit_id: Uuid, f: F) -> Result<(Visit, T)>
    where
        F: FnOnce(&mut Visit) -> Result<T>,
    {
        let mut visits = self.visits.write().await;
        let current = visits
            .get(&visit_id)
            .ok_or_else(|| ClinicError::NotFound(format!("visit {}", visit_id)))?;

        let mut updated = current.clone();
        let outcome = f(&mut updated)?;
        updated.updated_at = Utc::now();
        visits.insert(visit_id, updated.clone());

        Ok((updated, outcome))
    }
}
