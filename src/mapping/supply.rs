//! 거래처, 청구서, 지출, 재고, 기공 의뢰 매핑

use serde_json::json;

use super::{date_value, opt_date_value, storage_row, RemoteEntity, Row, RowReader, Table};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::EntityStore;

impl RemoteEntity for Supplier {
    const TABLE: Table = Table::Suppliers;
    const NAME: &'static str = "Supplier";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "name": self.name,
                "contact_person": self.contact_person,
                "phone": self.phone,
                "email": self.email,
                "address": self.address,
                "supplier_type": self.kind,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        let kind = match r.opt_string("supplier_type")? {
            None => SupplierKind::General,
            Some(_) => r.enumeration("supplier_type")?,
        };
        Ok(Supplier {
            id: r.string("id")?,
            name: r.string("name")?,
            contact_person: r.opt_string("contact_person")?,
            phone: r.opt_string("phone")?,
            email: r.opt_string("email")?,
            address: r.opt_string("address")?,
            kind,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.suppliers
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.suppliers
    }
}

impl RemoteEntity for SupplierInvoice {
    const TABLE: Table = Table::SupplierInvoices;
    const NAME: &'static str = "SupplierInvoice";
    const REFERENCES: &'static [&'static str] = &["supplier_id", "lab_case_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "supplier_id": self.supplier_id,
                "invoice_number": self.invoice_number,
                "invoice_date": date_value(self.invoice_date),
                "due_date": opt_date_value(self.due_date),
                "amount": self.amount,
                "payments": self.payments,
                "notes": self.notes,
                "lab_case_id": self.lab_case_id,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(SupplierInvoice {
            id: r.string("id")?,
            supplier_id: r.string("supplier_id")?,
            invoice_number: r.opt_string("invoice_number")?,
            invoice_date: r.date("invoice_date")?,
            due_date: r.opt_date("due_date")?,
            amount: r.number("amount")?,
            payments: r.json("payments")?,
            notes: r.opt_string("notes")?,
            lab_case_id: r.opt_string("lab_case_id")?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        if self.amount < 0.0 {
            return Err(AppError::Validation(
                "invoice amount cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.supplier_invoices
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.supplier_invoices
    }
}

impl RemoteEntity for Expense {
    const TABLE: Table = Table::Expenses;
    const NAME: &'static str = "Expense";
    const REFERENCES: &'static [&'static str] = &["supplier_id", "supplier_invoice_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "expense_date": date_value(self.date),
                "description": self.description,
                "amount": self.amount,
                "category": self.category,
                "payment_method": self.method,
                "supplier_id": self.supplier_id,
                "supplier_invoice_id": self.supplier_invoice_id,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(Expense {
            id: r.string("id")?,
            date: r.date("expense_date")?,
            description: r.opt_string("description")?.unwrap_or_default(),
            amount: r.number("amount")?,
            category: r.enumeration("category")?,
            method: r.enumeration("payment_method")?,
            supplier_id: r.opt_string("supplier_id")?,
            supplier_invoice_id: r.opt_string("supplier_invoice_id")?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(AppError::Validation(format!(
                "expense amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.expenses
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.expenses
    }
}

impl RemoteEntity for InventoryItem {
    const TABLE: Table = Table::InventoryItems;
    const NAME: &'static str = "InventoryItem";
    const REFERENCES: &'static [&'static str] = &["supplier_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "name": self.name,
                "category": self.category,
                "quantity": self.quantity,
                "unit": self.unit,
                "min_quantity": self.min_quantity,
                "unit_cost": self.unit_cost,
                "supplier_id": self.supplier_id,
                "expiry_date": opt_date_value(self.expiry_date),
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(InventoryItem {
            id: r.string("id")?,
            name: r.string("name")?,
            category: r.opt_string("category")?,
            quantity: r.number("quantity")?,
            unit: r.opt_string("unit")?.unwrap_or_default(),
            min_quantity: r.number("min_quantity")?,
            unit_cost: r.number("unit_cost")?,
            supplier_id: r.opt_string("supplier_id")?,
            expiry_date: r.opt_date("expiry_date")?,
        })
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.inventory_items
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.inventory_items
    }
}

impl RemoteEntity for LabCase {
    const TABLE: Table = Table::LabCases;
    const NAME: &'static str = "LabCase";
    const REFERENCES: &'static [&'static str] = &["patient_id", "dentist_id", "lab_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn to_storage(&self) -> Row {
        storage_row(
            &self.id,
            json!({
                "patient_id": self.patient_id,
                "dentist_id": self.dentist_id,
                "lab_id": self.lab_id,
                "case_type": self.case_type,
                "shade": self.shade,
                "status": self.status,
                "sent_date": opt_date_value(self.sent_date),
                "due_date": opt_date_value(self.due_date),
                "received_date": opt_date_value(self.received_date),
                "cost": self.cost,
                "notes": self.notes,
            }),
        )
    }

    fn from_storage(row: &Row) -> AppResult<Self> {
        let r = RowReader::new(Self::TABLE, row);
        Ok(LabCase {
            id: r.string("id")?,
            patient_id: r.string("patient_id")?,
            dentist_id: r.string("dentist_id")?,
            lab_id: r.string("lab_id")?,
            case_type: r.string("case_type")?,
            shade: r.opt_string("shade")?,
            status: r.enumeration("status")?,
            sent_date: r.opt_date("sent_date")?,
            due_date: r.opt_date("due_date")?,
            received_date: r.opt_date("received_date")?,
            cost: r.number("cost")?,
            notes: r.opt_string("notes")?,
        })
    }

    fn validate(&self) -> AppResult<()> {
        if self.cost < 0.0 {
            return Err(AppError::Validation(
                "lab case cost cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn collection(store: &EntityStore) -> &Vec<Self> {
        &store.lab_cases
    }

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self> {
        &mut store.lab_cases
    }
}
