//! # Clinic Workflow
//!
//! 就诊环节流转与队列引擎：环节注册表、就诊状态机、访问控制闸门、
//! 副作用编排器与实时队列聚合。

pub mod access;
pub mod effects;
pub mod engine;
pub mod machine;
pub mod queue;
pub mod services;
pub mod stages;
pub mod store;

pub use effects::SideEffectOrchestrator;
pub use engine::{VisitOutcome, WorkflowEngine};
pub use machine::TransitionEvent;
pub use queue::{QueueEntry, QueueSnapshot, QueueSummary, WaitStatus};
pub use services::CollaboratorServices;
pub use store::VisitStore;
