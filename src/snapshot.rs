//! 스냅샷 내보내기 / 일괄 복원
//!
//! 복원은 세션 소유 행을 모두 지우고 스냅샷을 다시 넣습니다. 원자적이지
//! 않으므로 중간에 실패하면 일부만 복원된 상태로 남습니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clinic::Clinic;
use crate::error::AppResult;
use crate::mapping::{RemoteEntity, Row, Table, OWNER_COLUMN};
use crate::models::*;
use crate::store::EntityStore;

/// 전체 컬렉션 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    pub data: EntityStore,
}

impl Snapshot {
    pub fn new(data: EntityStore) -> Self {
        Self {
            exported_at: Utc::now(),
            data,
        }
    }

    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub inserted: usize,
    /// 새 ID를 받은 행 수 (UUID가 아닌 샘플 ID)
    pub reassigned: usize,
}

fn rows_of<E: RemoteEntity>(store: &EntityStore) -> Vec<Row> {
    store.all::<E>().iter().map(E::to_storage).collect()
}

fn storage_rows(store: &EntityStore, table: Table) -> Vec<Row> {
    match table {
        Table::Patients => rows_of::<Patient>(store),
        Table::Dentists => rows_of::<Dentist>(store),
        Table::Appointments => rows_of::<Appointment>(store),
        Table::TreatmentDefinitions => rows_of::<TreatmentDefinition>(store),
        Table::TreatmentRecords => rows_of::<TreatmentRecord>(store),
        Table::Payments => rows_of::<Payment>(store),
        Table::DoctorPayments => rows_of::<DoctorPayment>(store),
        Table::Suppliers => rows_of::<Supplier>(store),
        Table::SupplierInvoices => rows_of::<SupplierInvoice>(store),
        Table::Expenses => rows_of::<Expense>(store),
        Table::InventoryItems => rows_of::<InventoryItem>(store),
        Table::LabCases => rows_of::<LabCase>(store),
        Table::Prescriptions => rows_of::<Prescription>(store),
        Table::PrescriptionItems => rows_of::<PrescriptionItem>(store),
        Table::PatientAttachments => rows_of::<PatientAttachment>(store),
    }
}

fn row_id(row: &Row) -> Option<String> {
    row.get("id").and_then(Value::as_str).map(str::to_string)
}

/// 참조 컬럼을 새 ID로 치환
fn remap_references(row: &mut Row, table: Table, ids: &HashMap<String, String>) {
    for column in table.references() {
        let replacement = row
            .get(*column)
            .and_then(Value::as_str)
            .and_then(|old| ids.get(old));
        if let Some(new_id) = replacement {
            let new_id = Value::String(new_id.clone());
            row.insert(column.to_string(), new_id);
        }
    }
}

impl Clinic {
    pub async fn export_snapshot(&self) -> Snapshot {
        Snapshot::new(self.snapshot().await)
    }

    /// 스냅샷으로 원격 데이터 교체
    ///
    /// 자식 테이블부터 지우고 부모 테이블부터 넣습니다. UUID가 아닌 ID는
    /// 빼고 넣어 저장소가 새 ID를 주게 하고, 뒤 테이블의 참조를 새 ID로
    /// 바꿉니다. 끝나면 전체를 다시 조회합니다.
    pub async fn restore_snapshot(&self, snapshot: &Snapshot) -> AppResult<RestoreSummary> {
        let remote = self.gateway().remote();
        let session = self.gateway().session();
        log::info!(
            "Restoring snapshot exported at {}",
            snapshot.exported_at.to_rfc3339()
        );

        for table in Table::ALL.iter().rev() {
            remote.delete_all(*table, session).await?;
        }

        let mut ids: HashMap<String, String> = HashMap::new();
        let mut summary = RestoreSummary::default();

        for table in Table::ALL {
            for mut row in storage_rows(&snapshot.data, table) {
                let old_id = row_id(&row);
                remap_references(&mut row, table, &ids);
                if !old_id
                    .as_deref()
                    .is_some_and(|id| Uuid::parse_str(id).is_ok())
                {
                    row.remove("id");
                }
                row.insert(
                    OWNER_COLUMN.to_string(),
                    Value::String(session.user_id.clone()),
                );

                let inserted = remote.insert(table, session, vec![row]).await?;
                summary.inserted += 1;

                let new_id = inserted.first().and_then(row_id);
                if let (Some(old), Some(new)) = (old_id, new_id) {
                    if old != new {
                        ids.insert(old, new);
                        summary.reassigned += 1;
                    }
                }
            }
            log::debug!("Restored {}", table);
        }

        // 청구서 지급 목록의 지출 ID는 지출보다 먼저 들어가므로 따로 치환
        for invoice in &snapshot.data.supplier_invoices {
            let mut changed = false;
            let payments: Vec<InvoicePayment> = invoice
                .payments
                .iter()
                .map(|p| match ids.get(&p.expense_id) {
                    Some(new_id) => {
                        changed = true;
                        InvoicePayment {
                            expense_id: new_id.clone(),
                            ..p.clone()
                        }
                    }
                    None => p.clone(),
                })
                .collect();
            if !changed {
                continue;
            }
            let invoice_id = ids.get(&invoice.id).unwrap_or(&invoice.id);
            let mut patch = Row::new();
            patch.insert("payments".to_string(), serde_json::to_value(&payments)?);
            remote
                .update(Table::SupplierInvoices, session, invoice_id, patch)
                .await?;
        }

        self.gateway().refetch_all().await?;
        log::info!(
            "Restored {} rows ({} with new ids)",
            summary.inserted,
            summary.reassigned
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn json_keeps_collections_and_stamp() {
        let mut data = EntityStore::default();
        data.upsert(Supplier {
            id: "sup-1".to_string(),
            name: "Bright Lab".to_string(),
            contact_person: None,
            phone: None,
            email: None,
            address: None,
            kind: SupplierKind::DentalLab,
        });
        let snapshot = Snapshot::new(data);
        let text = snapshot.to_json().unwrap();
        assert!(text.contains("\"exported_at\""));
        assert!(text.contains("Bright Lab"));
        assert_eq!(Snapshot::from_json(&text).unwrap(), snapshot);
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let snapshot =
            Snapshot::from_json(r#"{"exported_at":"2024-01-01T00:00:00Z","data":{}}"#).unwrap();
        assert_eq!(snapshot.data, EntityStore::default());
    }

    #[test]
    fn references_are_rewritten_only_when_mapped() {
        let record = TreatmentRecord {
            id: "tr-1".to_string(),
            patient_id: "sample-patient".to_string(),
            dentist_id: "0b9e0f8e-2f1e-4e55-9a4c-0d6f5d7f8a11".to_string(),
            treatment_definition_id: "sample-def".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            doctor_share: 1.0,
            clinic_share: 1.0,
            notes: Some("sample-patient".to_string()),
        };
        let mut row = record.to_storage();
        let ids = HashMap::from([("sample-patient".to_string(), "new-patient".to_string())]);
        remap_references(&mut row, Table::TreatmentRecords, &ids);

        assert_eq!(row["patient_id"], "new-patient");
        assert_eq!(row["treatment_definition_id"], "sample-def");
        assert_eq!(row["notes"], "sample-patient");
    }
}
