//! 副作用编排器
//!
//! 消费状态机在提交后派发的转换事件：挂号费开单、预约完结、住院自动
//! 出院。每个钩子有独立的错误边界和超时上限，失败只降级为响应上的
//! 警告信息，绝不回滚已提交的就诊变更。

use clinic_core::{ClinicError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::machine::TransitionEvent;
use crate::services::{
    AdmissionStatus, BillingLineItem, BillingStatus, CollaboratorServices, NewBillingRecord,
};

/// 挂号费账单类目（幂等判定键）
pub const CONSULTATION_CATEGORY: &str = "consultation";

/// 钩子默认超时
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(3);

/// 副作用编排器
pub struct SideEffectOrchestrator {
    services: CollaboratorServices,
    hook_timeout: Duration,
}

impl SideEffectOrchestrator {
    pub fn new(services: CollaboratorServices) -> Self {
        Self {
            services,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(services: CollaboratorServices, hook_timeout: Duration) -> Self {
        Self {
            services,
            hook_timeout,
        }
    }

    /// 处理一个转换事件，返回降级警告（成功时为空）
    pub async fn dispatch(&self, event: &TransitionEvent) -> Vec<String> {
        let mut warnings = Vec::new();

        match event {
            TransitionEvent::DoctorEntered {
                visit_id,
                branch_id,
            } => {
                match self
                    .bounded(
                        "billing",
                        self.ensure_consultation_billing(*visit_id, *branch_id),
                    )
                    .await
                {
                    Ok(Some(note)) => {
                        info!("Consultation billing for visit {}: {}", visit_id, note);
                        warnings.push(note);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Consultation billing failed for visit {}: {}", visit_id, e);
                        warnings.push(format!("billing generation failed: {}", e));
                    }
                }
            }
            TransitionEvent::VisitCheckedOut {
                visit_id,
                actor_id,
                appointment_id,
                admission_id,
            } => {
                if let Some(appointment_id) = appointment_id {
                    if let Err(e) = self
                        .bounded(
                            "appointment",
                            self.services.appointments.mark_completed(*appointment_id),
                        )
                        .await
                    {
                        warn!(
                            "Completing appointment {} for visit {} failed: {}",
                            appointment_id, visit_id, e
                        );
                        warnings.push(format!("appointment completion failed: {}", e));
                    }
                }

                if let Some(admission_id) = admission_id {
                    if let Err(e) = self
                        .bounded(
                            "admission",
                            self.auto_discharge(*admission_id, *actor_id, *visit_id),
                        )
                        .await
                    {
                        warn!(
                            "Auto-discharge of admission {} for visit {} failed: {}",
                            admission_id, visit_id, e
                        );
                        warnings.push(format!("auto-discharge failed: {}", e));
                    }
                }
            }
        }

        warnings
    }

    /// 确保就诊存在且仅存在一条挂号费账单
    ///
    /// 返回 Some(note) 表示无需开单的说明性结果：已开过单，或院区
    /// 未配置诊查费价目（缺价目绝不阻断诊疗流程）。
    async fn ensure_consultation_billing(
        &self,
        visit_id: Uuid,
        branch_id: Uuid,
    ) -> Result<Option<String>> {
        if self
            .services
            .billing
            .billing_exists_for_visit(visit_id, CONSULTATION_CATEGORY)
            .await?
        {
            return Ok(Some("consultation billing already exists".to_string()));
        }

        let Some(rate) = self
            .services
            .billing
            .find_active_consultation_rate(branch_id)
            .await?
        else {
            return Ok(Some(
                "no active consultation rate configured for branch, billing skipped".to_string(),
            ));
        };

        let record = NewBillingRecord {
            visit_id,
            line_items: vec![BillingLineItem {
                category: CONSULTATION_CATEGORY.to_string(),
                description: "Consultation fee".to_string(),
                quantity: 1,
                unit_price: rate,
                amount: rate,
            }],
            subtotal: rate,
            tax: 0.0,
            discount: 0.0,
            total: rate,
            balance: rate,
            status: BillingStatus::Pending,
        };
        let billing_id = self.services.billing.create_billing_record(record).await?;
        info!(
            "Generated consultation billing {} for visit {}",
            billing_id, visit_id
        );
        Ok(None)
    }

    /// 结账时仍在院的住院记录自动出院，出院人为结账操作人
    async fn auto_discharge(
        &self,
        admission_id: Uuid,
        actor_id: Uuid,
        visit_id: Uuid,
    ) -> Result<()> {
        let Some(admission) = self.services.admissions.get_admission(admission_id).await? else {
            return Err(ClinicError::NotFound(format!("admission {}", admission_id)));
        };

        if admission.status != AdmissionStatus::Admitted {
            return Ok(());
        }

        let note = format!("Automatically discharged on visit {} checkout", visit_id);
        self.services
            .admissions
            .discharge(admission_id, actor_id, &note)
            .await
    }

    async fn bounded<F, T>(&self, dependency: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.hook_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ClinicError::UpstreamUnavailable(format!(
                "{} 调用超时",
                dependency
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        AdmissionInfo, AdmissionService, AppointmentService, BillingService,
        InMemoryAdmissionService, InMemoryAppointmentService, InMemoryBillingService,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn services_with(
        billing: Arc<InMemoryBillingService>,
        appointments: Arc<InMemoryAppointmentService>,
        admissions: Arc<InMemoryAdmissionService>,
    ) -> CollaboratorServices {
        CollaboratorServices {
            billing,
            appointments,
            admissions,
        }
    }

    #[tokio::test]
    async fn test_billing_generated_once() {
        let billing = Arc::new(InMemoryBillingService::with_default_rate(50.0));
        let orchestrator = SideEffectOrchestrator::new(services_with(
            billing.clone(),
            Arc::new(InMemoryAppointmentService::new()),
            Arc::new(InMemoryAdmissionService::new()),
        ));

        let event = TransitionEvent::DoctorEntered {
            visit_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
        };

        let warnings = orchestrator.dispatch(&event).await;
        assert!(warnings.is_empty());

        // 重复派发必须是报告性的空操作，不产生第二条账单
        let warnings = orchestrator.dispatch(&event).await;
        assert_eq!(warnings, vec!["consultation billing already exists"]);

        let TransitionEvent::DoctorEntered { visit_id, .. } = event else {
            unreachable!()
        };
        let records = billing.records_for_visit(visit_id).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total, 50.0);
        assert_eq!(records[0].tax, 0.0);
        assert_eq!(records[0].balance, 50.0);
        assert_eq!(records[0].status, BillingStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_rate_is_documented_noop() {
        let billing = Arc::new(InMemoryBillingService::new());
        let orchestrator = SideEffectOrchestrator::new(services_with(
            billing.clone(),
            Arc::new(InMemoryAppointmentService::new()),
            Arc::new(InMemoryAdmissionService::new()),
        ));

        let visit_id = Uuid::new_v4();
        let warnings = orchestrator
            .dispatch(&TransitionEvent::DoctorEntered {
                visit_id,
                branch_id: Uuid::new_v4(),
            })
            .await;

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("billing skipped"));
        assert!(billing.records_for_visit(visit_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_discharges_admitted_patient() {
        let admissions = Arc::new(InMemoryAdmissionService::new());
        let appointments = Arc::new(InMemoryAppointmentService::new());
        let orchestrator = SideEffectOrchestrator::new(services_with(
            Arc::new(InMemoryBillingService::new()),
            appointments.clone(),
            admissions.clone(),
        ));

        let admission_id = Uuid::new_v4();
        let appointment_id = Uuid::new_v4();
        let actor_id = Uuid::new_v4();
        admissions.admit(admission_id).await;

        let warnings = orchestrator
            .dispatch(&TransitionEvent::VisitCheckedOut {
                visit_id: Uuid::new_v4(),
                actor_id,
                appointment_id: Some(appointment_id),
                admission_id: Some(admission_id),
            })
            .await;

        assert!(warnings.is_empty());
        assert!(appointments.is_completed(appointment_id).await);
        let record = admissions.discharge_record(admission_id).await.unwrap();
        assert_eq!(record.discharged_by, actor_id);
        assert!(record.note.contains("checkout"));
    }

    #[tokio::test]
    async fn test_already_discharged_admission_untouched() {
        let admissions = Arc::new(InMemoryAdmissionService::new());
        let orchestrator = SideEffectOrchestrator::new(services_with(
            Arc::new(InMemoryBillingService::new()),
            Arc::new(InMemoryAppointmentService::new()),
            admissions.clone(),
        ));

        let admission_id = Uuid::new_v4();
        let first_actor = Uuid::new_v4();
        admissions.admit(admission_id).await;
        admissions
            .discharge(admission_id, first_actor, "manual discharge")
            .await
            .unwrap();

        let warnings = orchestrator
            .dispatch(&TransitionEvent::VisitCheckedOut {
                visit_id: Uuid::new_v4(),
                actor_id: Uuid::new_v4(),
                appointment_id: None,
                admission_id: Some(admission_id),
            })
            .await;

        assert!(warnings.is_empty());
        let record = admissions.discharge_record(admission_id).await.unwrap();
        assert_eq!(record.discharged_by, first_actor);
    }

    struct FailingAdmissionService;

    #[async_trait]
    impl AdmissionService for FailingAdmissionService {
        async fn get_admission(&self, admission_id: Uuid) -> clinic_core::Result<Option<AdmissionInfo>> {
            Ok(Some(AdmissionInfo {
                id: admission_id,
                status: AdmissionStatus::Admitted,
            }))
        }

        async fn discharge(
            &self,
            _admission_id: Uuid,
            _actor_id: Uuid,
            _note: &str,
        ) -> clinic_core::Result<()> {
            Err(ClinicError::UpstreamUnavailable(
                "admission service down".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_discharge_failure_degrades_to_warning() {
        let orchestrator = SideEffectOrchestrator::new(CollaboratorServices {
            billing: Arc::new(InMemoryBillingService::new()),
            appointments: Arc::new(InMemoryAppointmentService::new()),
            admissions: Arc::new(FailingAdmissionService),
        });

        let warnings = orchestrator
            .dispatch(&TransitionEvent::VisitCheckedOut {
                visit_id: Uuid::new_v4(),
                actor_id: Uuid::new_v4(),
                appointment_id: None,
                admission_id: Some(Uuid::new_v4()),
            })
            .await;

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("auto-discharge failed"));
    }

    struct CountingServices {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BillingService for CountingServices {
        async fn find_active_consultation_rate(
            &self,
            _branch_id: Uuid,
        ) -> clinic_core::Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn billing_exists_for_visit(
            &self,
            _visit_id: Uuid,
            _category: &str,
        ) -> clinic_core::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }

        async fn create_billing_record(
            &self,
            _record: NewBillingRecord,
        ) -> clinic_core::Result<Uuid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Uuid::new_v4())
        }
    }

    #[async_trait]
    impl AppointmentService for CountingServices {
        async fn mark_completed(&self, _appointment_id: Uuid) -> clinic_core::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl AdmissionService for CountingServices {
        async fn get_admission(
            &self,
            _admission_id: Uuid,
        ) -> clinic_core::Result<Option<AdmissionInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn discharge(
            &self,
            _admission_id: Uuid,
            _actor_id: Uuid,
            _note: &str,
        ) -> clinic_core::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_checkout_without_links_makes_no_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(CountingServices {
            calls: calls.clone(),
        });
        let orchestrator = SideEffectOrchestrator::new(CollaboratorServices {
            billing: shared.clone(),
            appointments: shared.clone(),
            admissions: shared,
        });

        let warnings = orchestrator
            .dispatch(&TransitionEvent::VisitCheckedOut {
                visit_id: Uuid::new_v4(),
                actor_id: Uuid::new_v4(),
                appointment_id: None,
                admission_id: None,
            })
            .await;

        assert!(warnings.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
