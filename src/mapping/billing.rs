//! 진료 항목, 진료 기록, 수납, 의사 지급 매핑

use serde_json::json;

use super::{date_value, storage_row, RemoteEntity, Row, RowReader, Table};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::EntityStore;

impl RemoteEntity for TreatmentDefinition {
    const TABLE: Table = Table::TreatmentDefinitions;
    const NAME: &'static str = "TreatmentDefinition";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "name": self.name,
                "description": self.description,
                "base_price": self.base_price,
                "doctor_percentage": self.doctor_percentage,
                "clinic_percentage": self.clinic_percentage,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(TreatmentDefinition {
            id: r.string("id")?,
            name: r.string("name")?,
            description: r.opt_string("description")?,
            base_price: r.number("base_price")?,
            doctor_percentage: r.number("doctor_percentage")?,
            clinic_percentage: r.number("clinic_percentage")?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        TreatmentDefinition::validate(self)
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.treatment_definitions
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.treatment_definitions
    }
}

impl RemoteEntity for TreatmentRecord {
    const TABLE: Table = Table::TreatmentRecords;
    const NAME: &'static str = "TreatmentRecord";
    const REFERENCES: &'static [&'static str] =
        &["patient_id", "dentist_id", "treatment_definition_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "patient_id": self.patient_id,
                "dentist_id": self.dentist_id,
                "treatment_definition_id": self.treatment_definition_id,
                "treatment_date": date_value(self.date),
                "doctor_share": self.doctor_share,
                "clinic_share": self.clinic_share,
                // 조회용 파생 컬럼. 읽을 때는 배분액에서 다시 계산
                "total_treatment_cost": self.total_cost(),
                "notes": self.notes,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(TreatmentRecord {
            id: r.string("id")?,
            patient_id: r.string("patient_id")?,
            dentist_id: r.string("dentist_id")?,
            treatment_definition_id: r.string("treatment_definition_id")?,
            date: r.date("treatment_date")?,
            doctor_share: r.number("doctor_share")?,
            clinic_share: r.number("clinic_share")?,
            notes: r.opt_string("notes")?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        for (label, value) in [
            ("doctor_share", self.doctor_share),
            ("clinic_share", self.clinic_share),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "{} must be a non-negative number, got {}",
                    label, value
                )));
            }
        }
        Ok(())
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.treatment_records
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.treatment_records
    }
}

impl RemoteEntity for Payment {
    const TABLE: Table = Table::Payments;
    const NAME: &'static str = "Payment";
    const REFERENCES: &'static [&'static str] = &["patient_id", "treatment_record_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "patient_id": self.patient_id,
                "treatment_record_id": self.treatment_record_id,
                "amount": self.amount,
                "payment_method": self.method,
                "payment_date": date_value(self.date),
                "notes": self.notes,
                "doctor_share": self.doctor_share,
                "clinic_share": self.clinic_share,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(Payment {
            id: r.string("id")?,
            patient_id: r.string("patient_id")?,
            treatment_record_id: r.opt_string("treatment_record_id")?,
            amount: r.number("amount")?,
            method: r.enumeration("payment_method")?,
            date: r.date("payment_date")?,
            notes: r.opt_string("notes")?,
            doctor_share: r.number("doctor_share")?,
            clinic_share: r.number("clinic_share")?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        Payment::validate(self)
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.payments
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.payments
    }
}

impl RemoteEntity for DoctorPayment {
    const TABLE: Table = Table::DoctorPayments;
    const NAME: &'static str = "DoctorPayment";
    const REFERENCES: &'static [&'static str] = &["dentist_id", "source_payment_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "dentist_id": self.dentist_id,
                "amount": self.amount,
                "payment_date": date_value(self.date),
                "notes": self.notes,
                "source_payment_id": self.source_payment_id,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(DoctorPayment {
            id: r.string("id")?,
            dentist_id: r.string("dentist_id")?,
            amount: r.number("amount")?,
            date: r.date("payment_date")?,
            notes: r.opt_string("notes")?,
            source_payment_id: r.opt_string("source_payment_id")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.doctor_payments
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.doctor_payments
    }
}
