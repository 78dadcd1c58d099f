//! 外部协作服务接口
//!
//! 计费、预约、住院三个子系统仅以接口形式被本核心消费，
//! 随附的内存实现用于单机部署和测试。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_core::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// 账单行项目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingLineItem {
    pub category: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub amount: f64,
}

/// 新建账单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBillingRecord {
    pub visit_id: Uuid,
    pub line_items: Vec<BillingLineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub balance: f64,
    pub status: BillingStatus,
}

/// 账单状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Pending,
    Paid,
    Voided,
}

/// 住院状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    Admitted,
    Discharged,
}

/// 住院记录摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionInfo {
    pub id: Uuid,
    pub status: AdmissionStatus,
}

/// 计费/价目服务
#[async_trait]
pub trait BillingService: Send + Sync {
    /// 院区当前生效的挂号诊查费，未配置返回 None
    async fn find_active_consultation_rate(&self, branch_id: Uuid) -> Result<Option<f64>>;

    /// 该就诊是否已存在指定类目的有效账单（作废账单不计入）
    async fn billing_exists_for_visit(&self, visit_id: Uuid, category: &str) -> Result<bool>;

    async fn create_billing_record(&self, record: NewBillingRecord) -> Result<Uuid>;
}

/// 预约服务
#[async_trait]
pub trait AppointmentService: Send + Sync {
    async fn mark_completed(&self, appointment_id: Uuid) -> Result<()>;
}

/// 住院服务
#[async_trait]
pub trait AdmissionService: Send + Sync {
    async fn get_admission(&self, admission_id: Uuid) -> Result<Option<AdmissionInfo>>;

    async fn discharge(&self, admission_id: Uuid, actor_id: Uuid, note: &str) -> Result<()>;
}

/// 内存计费服务
#[derive(Default)]
pub struct InMemoryBillingService {
    rates: RwLock<HashMap<Uuid, f64>>,
    default_rate: Option<f64>,
    records: RwLock<Vec<(Uuid, NewBillingRecord)>>,
}

impl InMemoryBillingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未单独配置院区价目时使用的兜底价格
    pub fn with_default_rate(rate: f64) -> Self {
        Self {
            default_rate: Some(rate),
            ..Self::default()
        }
    }

    pub async fn set_branch_rate(&self, branch_id: Uuid, rate: f64) {
        self.rates.write().await.insert(branch_id, rate);
    }

    pub async fn records_for_visit(&self, visit_id: Uuid) -> Vec<NewBillingRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|(_, r)| r.visit_id == visit_id)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl BillingService for InMemoryBillingService {
    async fn find_active_consultation_rate(&self, branch_id: Uuid) -> Result<Option<f64>> {
        let rate = self.rates.read().await.get(&branch_id).copied();
        Ok(rate.or(self.default_rate))
    }

    async fn billing_exists_for_visit(&self, visit_id: Uuid, category: &str) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records.iter().any(|(_, r)| {
            r.visit_id == visit_id
                && r.status != BillingStatus::Voided
                && r.line_items.iter().any(|item| item.category == category)
        }))
    }

    async fn create_billing_record(&self, record: NewBillingRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        info!(
            "Created billing record {} for visit {} (total {:.2})",
            id, record.visit_id, record.total
        );
        self.records.write().await.push((id, record));
        Ok(id)
    }
}

/// 内存预约服务
#[derive(Default)]
pub struct InMemoryAppointmentService {
    completed: RwLock<Vec<Uuid>>,
}

impl InMemoryAppointmentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_completed(&self, appointment_id: Uuid) -> bool {
        self.completed.read().await.contains(&appointment_id)
    }
}

#[async_trait]
impl AppointmentService for InMemoryAppointmentService {
    async fn mark_completed(&self, appointment_id: Uuid) -> Result<()> {
        info!("Marking appointment {} completed", appointment_id);
        self.completed.write().await.push(appointment_id);
        Ok(())
    }
}

/// 出院明细（内存实现持有，接口层只暴露状态）
#[derive(Debug, Clone)]
pub struct DischargeRecord {
    pub discharged_by: Uuid,
    pub discharged_at: DateTime<Utc>,
    pub note: String,
}

/// 内存住院服务
#[derive(Default)]
pub struct InMemoryAdmissionService {
    admissions: RwLock<HashMap<Uuid, (AdmissionStatus, Option<DischargeRecord>)>>,
}

impl InMemoryAdmissionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn admit(&self, admission_id: Uuid) {
        self.admissions
            .write()
            .await
            .insert(admission_id, (AdmissionStatus::Admitted, None));
    }

    pub async fn discharge_record(&self, admission_id: Uuid) -> Option<DischargeRecord> {
        self.admissions
            .read()
            .await
            .get(&admission_id)
            .and_then(|(_, record)| record.clone())
    }
}

#[async_trait]
impl AdmissionService for InMemoryAdmissionService {
    async fn get_admission(&self, admission_id: Uuid) -> Result<Option<AdmissionInfo>> {
        let admissions = self.admissions.read().await;
        Ok(admissions.get(&admission_id).map(|(status, _)| AdmissionInfo {
            id: admission_id,
            status: *status,
        }))
    }

    async fn discharge(&self, admission_id: Uuid, actor_id: Uuid, note: &str) -> Result<()> {
        let mut admissions = self.admissions.write().await;
        let entry = admissions.get_mut(&admission_id).ok_or_else(|| {
            ClinicError::NotFound(format!("admission {}", admission_id))
        })?;

        entry.0 = AdmissionStatus::Discharged;
        entry.1 = Some(DischargeRecord {
            discharged_by: actor_id,
            discharged_at: Utc::now(),
            note: note.to_string(),
        });
        info!("Discharged admission {} by {}", admission_id, actor_id);
        Ok(())
    }
}

/// 副作用编排器依赖的协作服务集合
#[derive(Clone)]
pub struct CollaboratorServices {
    pub billing: Arc<dyn BillingService>,
    pub appointments: Arc<dyn AppointmentService>,
    pub admissions: Arc<dyn AdmissionService>,
}

impl CollaboratorServices {
    /// 单机部署用的全内存协作服务
    pub fn in_memory() -> Self {
        Self {
            billing: Arc::new(InMemoryBillingService::new()),
            appointments: Arc::new(InMemoryAppointmentService::new()),
            admissions: Arc::new(InMemoryAdmissionService::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_branch_rate_overrides_default() {
        let billing = InMemoryBillingService::with_default_rate(50.0);
        let branch = Uuid::new_v4();
        assert_eq!(
            billing.find_active_consultation_rate(branch).await.unwrap(),
            Some(50.0)
        );

        billing.set_branch_rate(branch, 80.0).await;
        assert_eq!(
            billing.find_active_consultation_rate(branch).await.unwrap(),
            Some(80.0)
        );
    }

    #[tokio::test]
    async fn test_voided_billing_not_counted() {
        let billing = InMemoryBillingService::new();
        let visit_id = Uuid::new_v4();
        let record = NewBillingRecord {
            visit_id,
            line_items: vec![BillingLineItem {
                category: "consultation".to_string(),
                description: "Consultation fee".to_string(),
                quantity: 1,
                unit_price: 50.0,
                amount: 50.0,
            }],
            subtotal: 50.0,
            tax: 0.0,
            discount: 0.0,
            total: 50.0,
            balance: 50.0,
            status: BillingStatus::Voided,
        };
        billing.create_billing_record(record).await.unwrap();

        // 作废账单不阻止重新开单
        assert!(!billing
            .billing_exists_for_visit(visit_id, "consultation")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_discharge_transitions_admission() {
        let admissions = InMemoryAdmissionService::new();
        let id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        admissions.admit(id).await;

        admissions.discharge(id, actor, "auto discharge").await.unwrap();
        let info = admissions.get_admission(id).await.unwrap().unwrap();
        assert_eq!(info.status, AdmissionStatus::Discharged);
        assert_eq!(
            admissions.discharge_record(id).await.unwrap().discharged_by,
            actor
        );
    }
}
