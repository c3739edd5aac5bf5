//! 엔티티 저장소
//!
//! 엔티티 타입별 순서 있는 컬렉션을 메모리에 보관합니다. 원격 작업이 확인된
//! 뒤에만 변경되며, 표시 계층은 항상 확인된 상태만 읽습니다.

use serde::{Deserialize, Serialize};

use crate::mapping::{RemoteEntity, Table};
use crate::models::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityStore {
    pub patients: Vec<Patient>,
    pub dentists: Vec<Dentist>,
    pub appointments: Vec<Appointment>,
    pub treatment_definitions: Vec<TreatmentDefinition>,
    pub treatment_records: Vec<TreatmentRecord>,
    pub payments: Vec<Payment>,
    pub doctor_payments: Vec<DoctorPayment>,
    pub suppliers: Vec<Supplier>,
    pub supplier_invoices: Vec<SupplierInvoice>,
    pub expenses: Vec<Expense>,
    pub inventory_items: Vec<InventoryItem>,
    pub lab_cases: Vec<LabCase>,
    pub prescriptions: Vec<Prescription>,
    pub prescription_items: Vec<PrescriptionItem>,
    pub patient_attachments: Vec<PatientAttachment>,
}

impl EntityStore {
    pub fn all<E: RemoteEntity>(&self) -> &[E] {
        E::collection(self)
    }

    pub fn find<E: RemoteEntity>(&self, id: &str) -> Option<&E> {
        E::collection(self).iter().find(|e| e.id() == id)
    }

    /// 같은 ID가 있으면 교체, 없으면 뒤에 추가
    pub fn upsert<E: RemoteEntity>(&mut self, entity: E) {
        let items = E::collection_mut(self);
        match items.iter_mut().find(|e| e.id() == entity.id()) {
            Some(existing) => *existing = entity,
            None => items.push(entity),
        }
    }

    /// ID가 일치하는 항목만 교체. 없으면 false
    pub fn replace<E: RemoteEntity>(&mut self, entity: E) -> bool {
        match E::collection_mut(self)
            .iter_mut()
            .find(|e| e.id() == entity.id())
        {
            Some(existing) => {
                *existing = entity;
                true
            }
            None => false,
        }
    }

    pub fn remove<E: RemoteEntity>(&mut self, id: &str) -> Option<E> {
        let items = E::collection_mut(self);
        let index = items.iter().position(|e| e.id() == id)?;
        Some(items.remove(index))
    }

    pub fn replace_all<E: RemoteEntity>(&mut self, entities: Vec<E>) {
        *E::collection_mut(self) = entities;
    }

    /// 다른 저장소의 해당 테이블 컬렉션을 그대로 가져옴
    pub(crate) fn take_table(&mut self, table: Table, other: &mut EntityStore) {
        match table {
            Table::Patients => self.patients = std::mem::take(&mut other.patients),
            Table::Dentists => self.dentists = std::mem::take(&mut other.dentists),
            Table::Appointments => self.appointments = std::mem::take(&mut other.appointments),
            Table::TreatmentDefinitions => {
                self.treatment_definitions = std::mem::take(&mut other.treatment_definitions)
            }
            Table::TreatmentRecords => {
                self.treatment_records = std::mem::take(&mut other.treatment_records)
            }
            Table::Payments => self.payments = std::mem::take(&mut other.payments),
            Table::DoctorPayments => {
                self.doctor_payments = std::mem::take(&mut other.doctor_payments)
            }
            Table::Suppliers => self.suppliers = std::mem::take(&mut other.suppliers),
            Table::SupplierInvoices => {
                self.supplier_invoices = std::mem::take(&mut other.supplier_invoices)
            }
            Table::Expenses => self.expenses = std::mem::take(&mut other.expenses),
            Table::InventoryItems => {
                self.inventory_items = std::mem::take(&mut other.inventory_items)
            }
            Table::LabCases => self.lab_cases = std::mem::take(&mut other.lab_cases),
            Table::Prescriptions => self.prescriptions = std::mem::take(&mut other.prescriptions),
            Table::PrescriptionItems => {
                self.prescription_items = std::mem::take(&mut other.prescription_items)
            }
            Table::PatientAttachments => {
                self.patient_attachments = std::mem::take(&mut other.patient_attachments)
            }
        }
    }

    pub fn len_of(&self, table: Table) -> usize {
        match table {
            Table::Patients => self.patients.len(),
            Table::Dentists => self.dentists.len(),
            Table::Appointments => self.appointments.len(),
            Table::TreatmentDefinitions => self.treatment_definitions.len(),
            Table::TreatmentRecords => self.treatment_records.len(),
            Table::Payments => self.payments.len(),
            Table::DoctorPayments => self.doctor_payments.len(),
            Table::Suppliers => self.suppliers.len(),
            Table::SupplierInvoices => self.supplier_invoices.len(),
            Table::Expenses => self.expenses.len(),
            Table::InventoryItems => self.inventory_items.len(),
            Table::LabCases => self.lab_cases.len(),
            Table::Prescriptions => self.prescriptions.len(),
            Table::PrescriptionItems => self.prescription_items.len(),
            Table::PatientAttachments => self.patient_attachments.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dentist(id: &str, name: &str) -> Dentist {
        Dentist {
            id: id.to_string(),
            name: name.to_string(),
            specialty: None,
            phone: None,
            email: None,
            color: "#3366ff".to_string(),
        }
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_order() {
        let mut store = EntityStore::default();
        store.upsert(dentist("d-1", "Lee"));
        store.upsert(dentist("d-2", "Park"));
        store.upsert(dentist("d-1", "Lee Jr."));

        let names: Vec<_> = store.all::<Dentist>().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Lee Jr.", "Park"]);
    }

    #[test]
    fn replace_only_touches_existing() {
        let mut store = EntityStore::default();
        assert!(!store.replace(dentist("d-1", "Lee")));
        assert!(store.all::<Dentist>().is_empty());

        store.upsert(dentist("d-1", "Lee"));
        assert!(store.replace(dentist("d-1", "Choi")));
        assert_eq!(store.find::<Dentist>("d-1").unwrap().name, "Choi");
    }

    #[test]
    fn remove_returns_removed_entity() {
        let mut store = EntityStore::default();
        store.upsert(dentist("d-1", "Lee"));
        let removed = store.remove::<Dentist>("d-1").unwrap();
        assert_eq!(removed.name, "Lee");
        assert!(store.remove::<Dentist>("d-1").is_none());
        assert_eq!(store.len_of(Table::Dentists), 0);
    }

    #[test]
    fn take_table_moves_one_collection() {
        let mut fresh = EntityStore::default();
        fresh.upsert(dentist("d-9", "New"));
        fresh.upsert(Patient::new("Kim"));

        let mut store = EntityStore::default();
        store.upsert(dentist("d-1", "Old"));
        store.take_table(Table::Dentists, &mut fresh);

        assert_eq!(store.all::<Dentist>()[0].id, "d-9");
        assert!(store.all::<Patient>().is_empty());
    }
}
