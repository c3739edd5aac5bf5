//! 스냅샷 내보내기 / 일괄 복원 테스트

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use clinic_core::models::*;
use clinic_core::{
    AppError, Clinic, CoreConfig, EntityStore, MemoryStore, Session, Snapshot, Table,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn clinic_over(store: &Arc<MemoryStore>) -> Clinic {
    Clinic::new(
        store.clone(),
        Session::new("user-1", ""),
        &CoreConfig::default(),
    )
}

/// 샘플 ID로 서로 참조하는 데이터 세트
fn sample_data() -> EntityStore {
    let mut data = EntityStore::default();
    let mut patient = Patient::new("Sample Patient");
    patient.id = "sample-patient-1".to_string();
    data.upsert(patient);

    // UUID는 그대로 유지되어야 함
    data.upsert(Dentist {
        id: "6f1c2a9e-3b7d-4c1a-9e2f-8a5b4c3d2e10".to_string(),
        name: "Dr. Park".to_string(),
        specialty: None,
        phone: None,
        email: None,
        color: "#e76f51".to_string(),
    });

    let mut def = TreatmentDefinition::new("Scaling", 100.0, 0.3);
    def.id = "sample-def-1".to_string();
    let mut record = TreatmentRecord::priced_from(
        &def,
        "sample-patient-1",
        "6f1c2a9e-3b7d-4c1a-9e2f-8a5b4c3d2e10",
        date(2024, 1, 8),
    );
    record.id = "sample-record-1".to_string();
    data.upsert(def);
    data.upsert(record);

    let mut payment = Payment::new("sample-patient-1", 100.0, PaymentMethod::Cash, date(2024, 1, 9))
        .for_treatment("sample-record-1");
    payment.id = "sample-payment-1".to_string();
    payment.doctor_share = 30.0;
    payment.clinic_share = 70.0;
    data.upsert(payment);
    data.upsert(DoctorPayment {
        id: "sample-dp-1".to_string(),
        dentist_id: "6f1c2a9e-3b7d-4c1a-9e2f-8a5b4c3d2e10".to_string(),
        amount: 30.0,
        date: date(2024, 1, 9),
        notes: Some("share from treatment on 2024-01-08".to_string()),
        source_payment_id: Some("sample-payment-1".to_string()),
    });

    data.upsert(Supplier {
        id: "sample-lab".to_string(),
        name: "Sample Lab".to_string(),
        contact_person: None,
        phone: None,
        email: None,
        address: None,
        kind: SupplierKind::DentalLab,
    });
    data.upsert(SupplierInvoice {
        id: "sample-invoice".to_string(),
        supplier_id: "sample-lab".to_string(),
        invoice_number: None,
        invoice_date: date(2024, 1, 10),
        due_date: None,
        amount: 90.0,
        payments: vec![InvoicePayment {
            expense_id: "sample-expense".to_string(),
            amount: 90.0,
            date: date(2024, 1, 12),
        }],
        notes: None,
        lab_case_id: None,
    });
    data.upsert(Expense {
        id: "sample-expense".to_string(),
        date: date(2024, 1, 12),
        description: "Lab bill".to_string(),
        amount: 90.0,
        category: ExpenseCategory::LabFees,
        method: PaymentMethod::BankTransfer,
        supplier_id: Some("sample-lab".to_string()),
        supplier_invoice_id: Some("sample-invoice".to_string()),
    });
    data
}

#[tokio::test]
async fn test_restore_reassigns_sample_ids_and_rewrites_references() {
    let store = Arc::new(MemoryStore::new());
    let clinic = clinic_over(&store);
    clinic.add(&Patient::new("Old data")).await.unwrap();

    let snapshot = Snapshot {
        exported_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
        data: sample_data(),
    };
    let summary = clinic.restore_snapshot(&snapshot).await.unwrap();
    assert_eq!(summary.inserted, 9);
    assert_eq!(summary.reassigned, 8);

    let state = clinic.snapshot().await;
    assert_eq!(state.patients.len(), 1);
    let patient = &state.patients[0];
    assert_eq!(patient.name, "Sample Patient");
    assert!(Uuid::parse_str(&patient.id).is_ok());

    let dentist = &state.dentists[0];
    assert_eq!(dentist.id, "6f1c2a9e-3b7d-4c1a-9e2f-8a5b4c3d2e10");

    let record = &state.treatment_records[0];
    assert_eq!(record.patient_id, patient.id);
    assert_eq!(record.treatment_definition_id, state.treatment_definitions[0].id);

    let payment = &state.payments[0];
    assert_eq!(payment.treatment_record_id.as_deref(), Some(record.id.as_str()));
    let dp = &state.doctor_payments[0];
    assert_eq!(dp.source_payment_id.as_deref(), Some(payment.id.as_str()));

    let invoice = &state.supplier_invoices[0];
    let expense = &state.expenses[0];
    assert_eq!(invoice.supplier_id, state.suppliers[0].id);
    assert_eq!(expense.supplier_invoice_id.as_deref(), Some(invoice.id.as_str()));
    assert_eq!(invoice.payments[0].expense_id, expense.id);
    assert_eq!(invoice.status(), InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_export_then_restore_elsewhere_reproduces_state() {
    let source_store = Arc::new(MemoryStore::new());
    let source = clinic_over(&source_store);
    source.restore_snapshot(&Snapshot::new(sample_data())).await.unwrap();
    let exported = source.export_snapshot().await;

    let json = exported.to_json().unwrap();
    let parsed = Snapshot::from_json(&json).unwrap();

    let target_store = Arc::new(MemoryStore::new());
    let target = clinic_over(&target_store);
    let summary = target.restore_snapshot(&parsed).await.unwrap();

    assert_eq!(summary.reassigned, 0);
    assert_eq!(target.snapshot().await, exported.data);
}

#[tokio::test]
async fn test_restore_is_scoped_to_session() {
    let store = Arc::new(MemoryStore::new());
    let other = Clinic::new(store.clone(), Session::new("user-2", ""), &CoreConfig::default());
    other.add(&Patient::new("Someone else")).await.unwrap();

    let clinic = clinic_over(&store);
    clinic
        .restore_snapshot(&Snapshot::new(sample_data()))
        .await
        .unwrap();

    assert_eq!(store.rows(Table::Patients).await.len(), 2);
    other.refresh().await.unwrap();
    assert_eq!(other.entities::<Patient>().await[0].name, "Someone else");
}

#[tokio::test]
async fn test_failed_restore_leaves_partial_data() {
    let store = Arc::new(MemoryStore::new());
    let clinic = clinic_over(&store);
    store.set_fail_writes_to(Some(Table::Expenses)).await;

    let err = clinic
        .restore_snapshot(&Snapshot::new(sample_data()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RemoteWrite { .. }));

    // 지출 테이블 삭제 단계에서 실패하므로 아무것도 들어가지 않음
    assert!(store.rows(Table::Patients).await.is_empty());

    store.set_fail_writes_to(None).await;
    store.set_fail_on_write(Some(store.write_count() + 20)).await;
    let err = clinic
        .restore_snapshot(&Snapshot::new(sample_data()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RemoteWrite { .. }));
    // 15개 테이블 삭제 후 다섯 번째 행에서 실패
    assert_eq!(store.rows(Table::Patients).await.len(), 1);
    assert!(store.rows(Table::Expenses).await.is_empty());
}
