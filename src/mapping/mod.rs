//! 원격 매핑 계층
//!
//! 메모리 엔티티와 Supabase 테이블 행 사이를 양방향으로 변환합니다.
//! 저장 행은 평평한 snake_case 컬럼 맵이며, 엔티티가 선언하지 않은 컬럼은
//! 읽을 때 조용히 버려집니다.

mod billing;
mod clinical;
mod supply;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::store::EntityStore;

/// 저장 행 (컬럼명 → 값)
pub type Row = serde_json::Map<String, Value>;

/// 세션 소유자 컬럼
pub const OWNER_COLUMN: &str = "user_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Patients,
    Dentists,
    Appointments,
    TreatmentDefinitions,
    TreatmentRecords,
    Payments,
    DoctorPayments,
    Suppliers,
    SupplierInvoices,
    Expenses,
    InventoryItems,
    LabCases,
    Prescriptions,
    PrescriptionItems,
    PatientAttachments,
}

impl Table {
    /// 부모 테이블이 먼저 오는 순서 (복원 시 삽입 순서, 삭제는 역순)
    pub const ALL: [Table; 15] = [
        Table::Patients,
        Table::Dentists,
        Table::Suppliers,
        Table::TreatmentDefinitions,
        Table::Appointments,
        Table::TreatmentRecords,
        Table::Payments,
        Table::DoctorPayments,
        Table::InventoryItems,
        Table::LabCases,
        Table::SupplierInvoices,
        Table::Expenses,
        Table::Prescriptions,
        Table::PrescriptionItems,
        Table::PatientAttachments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Patients => "patients",
            Table::Dentists => "dentists",
            Table::Appointments => "appointments",
            Table::TreatmentDefinitions => "treatment_definitions",
            Table::TreatmentRecords => "treatment_records",
            Table::Payments => "payments",
            Table::DoctorPayments => "doctor_payments",
            Table::Suppliers => "suppliers",
            Table::SupplierInvoices => "supplier_invoices",
            Table::Expenses => "expenses",
            Table::InventoryItems => "inventory_items",
            Table::LabCases => "lab_cases",
            Table::Prescriptions => "prescriptions",
            Table::PrescriptionItems => "prescription_items",
            Table::PatientAttachments => "patient_attachments",
        }
    }
}

impl Table {
    /// 다른 테이블의 ID를 담는 저장 컬럼
    pub fn references(&self) -> &'static [&'static str] {
        use crate::models::*;
        match self {
            Table::Patients => Patient::REFERENCES,
            Table::Dentists => Dentist::REFERENCES,
            Table::Appointments => Appointment::REFERENCES,
            Table::TreatmentDefinitions => TreatmentDefinition::REFERENCES,
            Table::TreatmentRecords => TreatmentRecord::REFERENCES,
            Table::Payments => Payment::REFERENCES,
            Table::DoctorPayments => DoctorPayment::REFERENCES,
            Table::Suppliers => Supplier::REFERENCES,
            Table::SupplierInvoices => SupplierInvoice::REFERENCES,
            Table::Expenses => Expense::REFERENCES,
            Table::InventoryItems => InventoryItem::REFERENCES,
            Table::LabCases => LabCase::REFERENCES,
            Table::Prescriptions => Prescription::REFERENCES,
            Table::PrescriptionItems => PrescriptionItem::REFERENCES,
            Table::PatientAttachments => PatientAttachment::REFERENCES,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 원격 테이블과 대응하는 엔티티
pub trait RemoteEntity: Clone + Send + Sync + Sized + 'static {
    const TABLE: Table;
    /// 로그와 오류 메시지용 이름
    const NAME: &'static str;
    /// 다른 엔티티 ID를 담는 저장 컬럼
    const REFERENCES: &'static [&'static str] = &[];

    fn id(&self) -> &str;

    fn to_storage(&self) -> Row;

    fn from_storage(row: &Row) -> AppResult<Self>;

    fn validate(&self) -> AppResult<()> {
        Ok(())
    }

    fn collection(store: &EntityStore) -> &Vec<Self>;

    fn collection_mut(store: &mut EntityStore) -> &mut Vec<Self>;
}

/// `json!` 객체를 행으로 바꾸고 ID가 있으면 넣음
pub(crate) fn storage_row(id: &str, fields: Value) -> Row {
    let mut row = match fields {
        Value::Object(map) => map,
        _ => Row::new(),
    };
    if !id.is_empty() {
        row.insert("id".to_string(), Value::String(id.to_string()));
    }
    row
}

pub(crate) fn date_value(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

pub(crate) fn opt_date_value(date: Option<NaiveDate>) -> Value {
    date.map(date_value).unwrap_or(Value::Null)
}

pub(crate) fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// 저장 행 읽기 도우미. 타입 정규화(숫자 문자열, 타임스탬프 날짜 등)를 담당
pub(crate) struct RowReader<'a> {
    table: Table,
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    pub fn new(table: Table, row: &'a Row) -> Self {
        Self { table, row }
    }

    fn error(&self, column: &str, message: impl std::fmt::Display) -> AppError {
        AppError::Mapping {
            table: self.table.as_str(),
            message: format!("column '{}': {}", column, message),
        }
    }

    fn value(&self, column: &str) -> Option<&'a Value> {
        match self.row.get(column) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    pub fn string(&self, column: &str) -> AppResult<String> {
        self.opt_string(column)?
            .ok_or_else(|| self.error(column, "missing required value"))
    }

    pub fn opt_string(&self, column: &str) -> AppResult<Option<String>> {
        match self.value(column) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.error(column, format!("expected text, got {}", other))),
        }
    }

    /// 누락/NULL 은 0
    pub fn number(&self, column: &str) -> AppResult<f64> {
        Ok(self.opt_number(column)?.unwrap_or(0.0))
    }

    pub fn opt_number(&self, column: &str) -> AppResult<Option<f64>> {
        match self.value(column) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.error(column, "number out of range")),
            // numeric 컬럼은 문자열로 올 수 있음
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| self.error(column, e)),
            Some(other) => Err(self.error(column, format!("expected number, got {}", other))),
        }
    }

    pub fn boolean(&self, column: &str) -> AppResult<bool> {
        match self.value(column) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s == "true" => Ok(true),
            Some(Value::String(s)) if s == "false" => Ok(false),
            Some(other) => Err(self.error(column, format!("expected boolean, got {}", other))),
        }
    }

    pub fn date(&self, column: &str) -> AppResult<NaiveDate> {
        self.opt_date(column)?
            .ok_or_else(|| self.error(column, "missing required date"))
    }

    /// `YYYY-MM-DD` 또는 타임스탬프의 날짜 부분
    pub fn opt_date(&self, column: &str) -> AppResult<Option<NaiveDate>> {
        let Some(text) = self.opt_string(column)? else {
            return Ok(None);
        };
        let date_part = text.get(..10).unwrap_or(&text);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| self.error(column, e))
    }

    pub fn timestamp(&self, column: &str) -> AppResult<DateTime<Utc>> {
        self.opt_timestamp(column)?
            .ok_or_else(|| self.error(column, "missing required timestamp"))
    }

    pub fn opt_timestamp(&self, column: &str) -> AppResult<Option<DateTime<Utc>>> {
        let Some(text) = self.opt_string(column)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| self.error(column, e))
    }

    pub fn enumeration<T: DeserializeOwned>(&self, column: &str) -> AppResult<T> {
        let value = self
            .value(column)
            .ok_or_else(|| self.error(column, "missing required value"))?;
        serde_json::from_value(value.clone()).map_err(|e| self.error(column, e))
    }

    /// JSON 컬럼. NULL 이면 기본값, text 컬럼에 담긴 JSON 문자열도 허용
    pub fn json<T: DeserializeOwned + Default>(&self, column: &str) -> AppResult<T> {
        match self.value(column) {
            None => Ok(T::default()),
            Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| self.error(column, e)),
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| self.error(column, e)),
        }
    }
}
