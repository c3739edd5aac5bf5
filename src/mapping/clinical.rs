//! 환자, 의사, 예약, 처방, 첨부 매핑

use serde_json::{json, Value};

use super::{date_value, storage_row, timestamp_value, RemoteEntity, Row, RowReader, Table};
use crate::error::AppResult;
use crate::models::*;
use crate::store::EntityStore;

impl RemoteEntity for Patient {
    const TABLE: Table = Table::Patients;
    const NAME: &'static str = "Patient";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        let mut row = storage_row(
            &self.id,
            json!({
                "name": self.name,
                "phone": self.phone,
                "email": self.email,
                "date_of_birth": self.date_of_birth.map(date_value),
                "gender": self.gender,
                "address": self.address,
                "medical_history": self.medical_history,
                "allergies": self.allergies,
                "current_medications": self.medications,
                "notes": self.notes,
                "dental_chart": self.dental_chart,
                "images": self.images,
            }),
        );
        // 생성 시각이 없으면 DB 기본값에 맡김
        if let Some(created_at) = self.created_at {
            row.insert("created_at".to_string(), timestamp_value(created_at));
        }
        row
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(Patient {
            id: r.string("id")?,
            name: r.string("name")?,
            phone: r.opt_string("phone")?,
            email: r.opt_string("email")?,
            date_of_birth: r.opt_date("date_of_birth")?,
            gender: r.opt_string("gender")?,
            address: r.opt_string("address")?,
            medical_history: r.opt_string("medical_history")?,
            allergies: r.opt_string("allergies")?,
            medications: r.opt_string("current_medications")?,
            notes: r.opt_string("notes")?,
            dental_chart: r.json("dental_chart")?,
            images: r.json("images")?,
            created_at: r.opt_timestamp("created_at")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.patients
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.patients
    }
}

impl RemoteEntity for Dentist {
    const TABLE: Table = Table::Dentists;
    const NAME: &'static str = "Dentist";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "name": self.name,
                "specialty": self.specialty,
                "phone": self.phone,
                "email": self.email,
                "color": self.color,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(Dentist {
            id: r.string("id")?,
            name: r.string("name")?,
            specialty: r.opt_string("specialty")?,
            phone: r.opt_string("phone")?,
            email: r.opt_string("email")?,
            color: r.opt_string("color")?.unwrap_or_else(|| "#3b82f6".to_string()),
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.dentists
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.dentists
    }
}

impl RemoteEntity for Appointment {
    const TABLE: Table = Table::Appointments;
    const NAME: &'static str = "Appointment";
    const REFERENCES: &'static [&'static str] = &["patient_id", "dentist_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "patient_id": self.patient_id,
                "dentist_id": self.dentist_id,
                "start_time": timestamp_value(self.start),
                "end_time": timestamp_value(self.end),
                "reason": self.reason,
                "status": self.status,
                "reminder_time": self.reminder,
                "reminder_sent": self.reminder_sent,
                "notes": self.notes,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        let reminder = if row.get("reminder_time").map_or(true, Value::is_null) {
            ReminderPolicy::None
        } else {
            r.enumeration("reminder_time")?
        };
        Ok(Appointment {
            id: r.string("id")?,
            patient_id: r.string("patient_id")?,
            dentist_id: r.string("dentist_id")?,
            start: r.timestamp("start_time")?,
            end: r.timestamp("end_time")?,
            reason: r.opt_string("reason")?,
            status: r.enumeration("status")?,
            reminder,
            reminder_sent: r.boolean("reminder_sent")?,
            notes: r.opt_string("notes")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.appointments
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.appointments
    }
}

impl RemoteEntity for Prescription {
    const TABLE: Table = Table::Prescriptions;
    const NAME: &'static str = "Prescription";
    const REFERENCES: &'static [&'static str] = &["patient_id", "dentist_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "patient_id": self.patient_id,
                "dentist_id": self.dentist_id,
                "prescription_date": date_value(self.date),
                "notes": self.notes,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(Prescription {
            id: r.string("id")?,
            patient_id: r.string("patient_id")?,
            dentist_id: r.string("dentist_id")?,
            date: r.date("prescription_date")?,
            notes: r.opt_string("notes")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.prescriptions
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.prescriptions
    }
}

impl RemoteEntity for PrescriptionItem {
    const TABLE: Table = Table::PrescriptionItems;
    const NAME: &'static str = "PrescriptionItem";
    const REFERENCES: &'static [&'static str] = &["prescription_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "prescription_id": self.prescription_id,
                "medication_name": self.medication_name,
                "dosage": self.dosage,
                "frequency": self.frequency,
                "duration": self.duration,
                "instructions": self.instructions,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(PrescriptionItem {
            id: r.string("id")?,
            prescription_id: r.string("prescription_id")?,
            medication_name: r.string("medication_name")?,
            dosage: r.opt_string("dosage")?,
            frequency: r.opt_string("frequency")?,
            duration: r.opt_string("duration")?,
            instructions: r.opt_string("instructions")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.prescription_items
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.prescription_items
    }
}

impl RemoteEntity for PatientAttachment {
    const TABLE: Table = Table::PatientAttachments;
    const NAME: &'static str = "PatientAttachment";
    const REFERENCES: &'static [&'static str] = &["patient_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "patient_id": self.patient_id,
                "file_name": self.file_name,
                "file_type": self.file_type,
                "file_url": self.url,
                "uploaded_at": timestamp_value(self.uploaded_at),
                "notes": self.notes,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(PatientAttachment {
            id: r.string("id")?,
            patient_id: r.string("patient_id")?,
            file_name: r.string("file_name")?,
            file_type: r.opt_string("file_type")?,
            url: r.string("file_url")?,
            uploaded_at: r.timestamp("uploaded_at")?,
            notes: r.opt_string("notes")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.patient_attachments
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.patient_attachments
    }
}
