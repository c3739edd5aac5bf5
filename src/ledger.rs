//! 장부 집계 (읽기 전용)

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::*;
use crate::store::EntityStore;

/// 의사 정산
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DentistBalance {
    /// 진료 기록의 고정 의사 몫 합계
    pub accrued: f64,
    pub paid: f64,
    pub owed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatientBalance {
    pub billed: f64,
    pub paid: f64,
    pub outstanding: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Revenue {
    pub total: f64,
    pub doctor_share: f64,
    pub clinic_share: f64,
}

/// 저장소 스냅샷 위의 집계
pub struct Ledger {
    store: EntityStore,
}

impl Ledger {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub fn dentist_balance(&self, dentist_id: &str) -> DentistBalance {
        let accrued: f64 = self
            .store
            .treatment_records
            .iter()
            .filter(|r| r.dentist_id == dentist_id)
            .map(|r| r.doctor_share)
            .sum();
        let paid: f64 = self
            .store
            .doctor_payments
            .iter()
            .filter(|p| p.dentist_id == dentist_id)
            .map(|p| p.amount)
            .sum();
        DentistBalance {
            accrued,
            paid,
            owed: accrued - paid,
        }
    }

    pub fn patient_balance(&self, patient_id: &str) -> PatientBalance {
        let billed: f64 = self
            .store
            .treatment_records
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .map(TreatmentRecord::total_cost)
            .sum();
        let paid: f64 = self
            .store
            .payments
            .iter()
            .filter(|p| p.patient_id == patient_id)
            .map(|p| p.amount)
            .sum();
        PatientBalance {
            billed,
            paid,
            outstanding: billed - paid,
        }
    }

    /// 기간 내 수납 합계 (양 끝 포함)
    pub fn revenue_between(&self, from: NaiveDate, to: NaiveDate) -> Revenue {
        self.store
            .payments
            .iter()
            .filter(|p| p.date >= from && p.date <= to)
            .fold(Revenue::default(), |acc, p| Revenue {
                total: acc.total + p.amount,
                doctor_share: acc.doctor_share + p.doctor_share,
                clinic_share: acc.clinic_share + p.clinic_share,
            })
    }

    pub fn low_stock_items(&self) -> Vec<&InventoryItem> {
        self.store
            .inventory_items
            .iter()
            .filter(|item| item.is_low_stock())
            .collect()
    }

    pub fn outstanding_invoices(&self) -> Vec<&SupplierInvoice> {
        self.store
            .supplier_invoices
            .iter()
            .filter(|inv| inv.balance() > 0.0)
            .collect()
    }
}
