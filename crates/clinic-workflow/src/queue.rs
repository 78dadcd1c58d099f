//! 队列聚合器
//!
//! 就诊集合到各科室实时队列的纯投影：每次看板请求重新计算，
//! 不落盘、不缓存。等待时长按当前环节的签到时间推算并分级。

use chrono::{DateTime, Utc};
use clinic_core::{Visit, VisitStage, VisitStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::stages::{self, OPERATIONAL_STAGES};

/// 等待时长分级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    Green,  // < 30 分钟
    Yellow, // 30-59 分钟
    Red,    // >= 60 分钟
}

impl WaitStatus {
    pub fn classify(wait_minutes: i64) -> Self {
        if wait_minutes < 30 {
            WaitStatus::Green
        } else if wait_minutes < 60 {
            WaitStatus::Yellow
        } else {
            WaitStatus::Red
        }
    }
}

/// 队列中的一条就诊
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub visit_id: Uuid,
    pub patient_id: Uuid,
    /// 实际停靠环节（返回前台的就诊此处仍为 returned_to_front_desk）
    pub stage: VisitStage,
    pub clocked_in_at: Option<DateTime<Utc>>,
    pub wait_minutes: i64,
    pub wait_status: WaitStatus,
}

/// 队列汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSummary {
    pub total_in_progress: usize,
    /// 全部就诊的平均等待（整数分钟，四舍五入）
    pub average_wait_minutes: i64,
    /// 人数最多的科室，并列时取枚举顺序在前者
    pub busiest_stage: Option<VisitStage>,
}

/// 队列快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub stage_counts: HashMap<VisitStage, usize>,
    pub stage_visits: HashMap<VisitStage, Vec<QueueEntry>>,
    pub summary: QueueSummary,
}

/// 构建队列快照
///
/// 输入应为进行中的就诊；非进行中的记录被防御性跳过。
pub fn queue_snapshot(visits: &[Visit], now: DateTime<Utc>) -> QueueSnapshot {
    let mut stage_counts: HashMap<VisitStage, usize> = HashMap::new();
    let mut stage_visits: HashMap<VisitStage, Vec<QueueEntry>> = HashMap::new();
    for stage in OPERATIONAL_STAGES {
        stage_counts.insert(stage, 0);
        stage_visits.insert(stage, Vec::new());
    }

    let mut total_wait: i64 = 0;
    let mut counted = 0usize;

    for visit in visits {
        if visit.status != VisitStatus::InProgress {
            continue;
        }

        let key = stages::queue_key(visit.current_stage);
        // 进行中的就诊不会停在 completed；若数据异常則不计入任何队列
        if !OPERATIONAL_STAGES.contains(&key) {
            continue;
        }

        let clocked_in_at = visit.stages.clock(visit.current_stage).clocked_in_at;
        let wait_minutes = clocked_in_at
            .map(|t| (now - t).num_minutes().max(0))
            .unwrap_or(0);

        total_wait += wait_minutes;
        counted += 1;

        *stage_counts.entry(key).or_insert(0) += 1;
        stage_visits.entry(key).or_default().push(QueueEntry {
            visit_id: visit.id,
            patient_id: visit.patient_id,
            stage: visit.current_stage,
            clocked_in_at,
            wait_minutes,
            wait_status: WaitStatus::classify(wait_minutes),
        });
    }

    let average_wait_minutes = if counted == 0 {
        0
    } else {
        (total_wait as f64 / counted as f64).round() as i64
    };

    // 并列时取枚举顺序在前的科室
    let mut busiest_stage: Option<VisitStage> = None;
    let mut busiest_count = 0usize;
    for stage in OPERATIONAL_STAGES {
        let count = stage_counts[&stage];
        if count > busiest_count {
            busiest_stage = Some(stage);
            busiest_count = count;
        }
    }

    QueueSnapshot {
        stage_counts,
        stage_visits,
        summary: QueueSummary {
            total_in_progress: counted,
            average_wait_minutes,
            busiest_stage,
        },
    }
}
