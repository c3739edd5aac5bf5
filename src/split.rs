//! 수익 배분
//!
//! 금액을 담당 의사 몫과 병원 몫으로 나눕니다. 병원 몫은 뺄셈으로 구하므로
//! 두 몫의 합은 반올림과 상관없이 항상 원래 금액과 같습니다.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{TreatmentDefinition, TreatmentRecord};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub doctor_share: f64,
    pub clinic_share: f64,
}

impl Split {
    /// 진료 연결이 없는 금액은 전부 병원 몫
    pub fn clinic_only(amount: f64) -> Self {
        Self {
            doctor_share: 0.0,
            clinic_share: amount,
        }
    }
}

/// 통화 단위 반올림 (0.5는 0에서 먼 쪽으로)
pub fn round_currency(value: f64) -> f64 {
    value.round()
}

pub fn split(amount: f64, doctor_percentage: f64) -> Split {
    let doctor_share = round_currency(amount * doctor_percentage);
    Split {
        doctor_share,
        clinic_share: amount - doctor_share,
    }
}

/// 수납 배분 계산
///
/// 연결된 진료 기록의 고정 배분액이 아니라 그 기록이 가리키는 진료 항목의
/// *현재* 배분율을 사용합니다.
pub fn payment_split(
    store: &EntityStore,
    treatment_record_id: Option<&str>,
    amount: f64,
) -> AppResult<Split> {
    let Some(record_id) = treatment_record_id else {
        return Ok(Split::clinic_only(amount));
    };
    let (record, definition) = linked_definition(store, record_id)?;

    let result = split(amount, definition.doctor_percentage);

    let total = record.total_cost();
    if total > 0.0 {
        let frozen_ratio = record.doctor_share / total;
        if (frozen_ratio - definition.doctor_percentage).abs() > 1e-9 {
            log::info!(
                "Treatment '{}' split changed since record {} ({:.4} -> {:.4}); using current percentages",
                definition.name,
                record.id,
                frozen_ratio,
                definition.doctor_percentage
            );
        }
    }

    Ok(result)
}

pub(crate) fn linked_definition<'a>(
    store: &'a EntityStore,
    record_id: &str,
) -> AppResult<(&'a TreatmentRecord, &'a TreatmentDefinition)> {
    let record = store
        .find::<TreatmentRecord>(record_id)
        .ok_or_else(|| AppError::not_found("TreatmentRecord", record_id))?;
    let definition = store
        .find::<TreatmentDefinition>(&record.treatment_definition_id)
        .ok_or_else(|| {
            AppError::not_found("TreatmentDefinition", &record.treatment_definition_id)
        })?;
    Ok((record, definition))
}
