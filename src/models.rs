use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::split::{self, Split};

/// 영구치 개수 (치식 번호 1..=32)
pub const TOOTH_COUNT: u8 = 32;

const PERCENTAGE_TOLERANCE: f64 = 1e-9;

// ============ 환자 ============

/// 환자 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub notes: Option<String>,
    pub dental_chart: DentalChart,
    pub images: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Patient {
    /// 접수 시 생성. 치아 차트는 전부 정상 상태로 시작
    pub fn new(name: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            phone: None,
            email: None,
            date_of_birth: None,
            gender: None,
            address: None,
            medical_history: None,
            allergies: None,
            medications: None,
            notes: None,
            dental_chart: DentalChart::default(),
            images: Vec::new(),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToothStatus {
    Healthy,
    Decayed,
    Filled,
    Crown,
    RootCanal,
    Implant,
    Missing,
    Extracted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToothEntry {
    pub status: ToothStatus,
    #[serde(default)]
    pub notes: String,
}

impl Default for ToothEntry {
    fn default() -> Self {
        Self {
            status: ToothStatus::Healthy,
            notes: String::new(),
        }
    }
}

/// 치아별 차트 (32개 위치 고정)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<u8, ToothEntry>", into = "BTreeMap<u8, ToothEntry>")]
pub struct DentalChart(BTreeMap<u8, ToothEntry>);

impl DentalChart {
    pub fn tooth(&self, number: u8) -> Option<&ToothEntry> {
        self.0.get(&number)
    }

    /// 범위 밖 번호는 무시
    pub fn set(&mut self, number: u8, entry: ToothEntry) -> bool {
        if !(1..=TOOTH_COUNT).contains(&number) {
            return false;
        }
        self.0.insert(number, entry);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u8, &ToothEntry)> {
        self.0.iter()
    }

    pub fn is_all_healthy(&self) -> bool {
        self.0.values().all(|t| t.status == ToothStatus::Healthy)
    }
}

impl Default for DentalChart {
    fn default() -> Self {
        Self((1..=TOOTH_COUNT).map(|n| (n, ToothEntry::default())).collect())
    }
}

impl From<BTreeMap<u8, ToothEntry>> for DentalChart {
    /// 빠진 번호는 정상으로 채우고 범위 밖 번호는 버림
    fn from(entries: BTreeMap<u8, ToothEntry>) -> Self {
        let mut chart = DentalChart::default();
        for (number, entry) in entries {
            chart.set(number, entry);
        }
        chart
    }
}

impl From<DentalChart> for BTreeMap<u8, ToothEntry> {
    fn from(chart: DentalChart) -> Self {
        chart.0
    }
}

// ============ 의사 / 예약 ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dentist {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// 일정표 표시 색상 (#RRGGBB)
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderPolicy {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "1_hour_before")]
    OneHourBefore,
    #[serde(rename = "2_hours_before")]
    TwoHoursBefore,
    #[serde(rename = "1_day_before")]
    OneDayBefore,
}

impl ReminderPolicy {
    pub fn lead_time(&self) -> Option<Duration> {
        match self {
            ReminderPolicy::None => None,
            ReminderPolicy::OneHourBefore => Some(Duration::hours(1)),
            ReminderPolicy::TwoHoursBefore => Some(Duration::hours(2)),
            ReminderPolicy::OneDayBefore => Some(Duration::days(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub dentist_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub reminder: ReminderPolicy,
    /// 리마인더 워크플로가 한 번만 설정함
    pub reminder_sent: bool,
    pub notes: Option<String>,
}

impl Appointment {
    /// 리마인더 발송 시각. 정책이 없거나 이미 보냈으면 None
    pub fn reminder_due_at(&self) -> Option<DateTime<Utc>> {
        if self.reminder_sent {
            return None;
        }
        self.reminder.lead_time().map(|lead| self.start - lead)
    }
}

// ============ 진료 / 수납 ============

/// 진료 항목 템플릿 (가격 + 의사/병원 배분율)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub base_price: f64,
    pub doctor_percentage: f64,
    pub clinic_percentage: f64,
}

impl TreatmentDefinition {
    pub fn new(name: &str, base_price: f64, doctor_percentage: f64) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            description: None,
            base_price,
            doctor_percentage,
            clinic_percentage: 1.0 - doctor_percentage,
        }
    }

    /// doctor_percentage + clinic_percentage == 1
    pub fn validate(&self) -> AppResult<()> {
        for (label, value) in [
            ("doctor_percentage", self.doctor_percentage),
            ("clinic_percentage", self.clinic_percentage),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AppError::Validation(format!(
                    "{} must be between 0 and 1, got {}",
                    label, value
                )));
            }
        }
        let sum = self.doctor_percentage + self.clinic_percentage;
        if (sum - 1.0).abs() > PERCENTAGE_TOLERANCE {
            return Err(AppError::Validation(format!(
                "treatment '{}' percentages must sum to 1, got {}",
                self.name, sum
            )));
        }
        if self.base_price < 0.0 {
            return Err(AppError::Validation(format!(
                "treatment '{}' has a negative base price",
                self.name
            )));
        }
        Ok(())
    }
}

/// 진료 기록. 배분액은 생성 시점에 고정됨
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentRecord {
    pub id: String,
    pub patient_id: String,
    pub dentist_id: String,
    pub treatment_definition_id: String,
    pub date: NaiveDate,
    pub doctor_share: f64,
    pub clinic_share: f64,
    pub notes: Option<String>,
}

impl TreatmentRecord {
    /// 정의의 기본 가격과 현재 배분율로 배분액을 미리 계산
    pub fn priced_from(
        definition: &TreatmentDefinition,
        patient_id: &str,
        dentist_id: &str,
        date: NaiveDate,
    ) -> Self {
        let Split {
            doctor_share,
            clinic_share,
        } = split::split(definition.base_price, definition.doctor_percentage);
        Self {
            id: String::new(),
            patient_id: patient_id.to_string(),
            dentist_id: dentist_id.to_string(),
            treatment_definition_id: definition.id.clone(),
            date,
            doctor_share,
            clinic_share,
            notes: None,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.doctor_share + self.clinic_share
    }

    /// 파생 의사 지급 메모에 들어가는 진료일 문자열
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Insurance,
    Other,
}

/// 환자 수납
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub patient_id: String,
    pub treatment_record_id: Option<String>,
    pub amount: f64,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub doctor_share: f64,
    pub clinic_share: f64,
}

impl Payment {
    pub fn new(patient_id: &str, amount: f64, method: PaymentMethod, date: NaiveDate) -> Self {
        Self {
            id: String::new(),
            patient_id: patient_id.to_string(),
            treatment_record_id: None,
            amount,
            method,
            date,
            notes: None,
            doctor_share: 0.0,
            clinic_share: amount,
        }
    }

    pub fn for_treatment(mut self, treatment_record_id: &str) -> Self {
        self.treatment_record_id = Some(treatment_record_id.to_string());
        self
    }

    /// 금액만 확인. 배분액은 다시 계산될 예정일 때 사용
    pub fn validate_amount(&self) -> AppResult<()> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(AppError::Validation(format!(
                "payment amount must be a non-negative number, got {}",
                self.amount
            )));
        }
        Ok(())
    }

    /// 쓰기 직전 검사. 의사 몫 + 병원 몫 == 금액
    pub fn validate(&self) -> AppResult<()> {
        self.validate_amount()?;
        for (name, share) in [
            ("doctor_share", self.doctor_share),
            ("clinic_share", self.clinic_share),
        ] {
            if !share.is_finite() || share < 0.0 {
                return Err(AppError::Validation(format!(
                    "payment {} must be a non-negative number, got {}",
                    name, share
                )));
            }
        }
        if (self.doctor_share + self.clinic_share - self.amount).abs() > SHARE_TOLERANCE {
            return Err(AppError::Validation(format!(
                "payment shares {} + {} do not add up to {}",
                self.doctor_share, self.clinic_share, self.amount
            )));
        }
        Ok(())
    }
}

/// 배분 합계 허용 오차 (반 센트)
const SHARE_TOLERANCE: f64 = 0.005;

/// 의사에게 실제 지급/적립된 금액
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorPayment {
    pub id: String,
    pub dentist_id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub notes: Option<String>,
    /// 이 항목을 만든 수납 ID (수동 지급이면 None)
    pub source_payment_id: Option<String>,
}

// ============ 거래처 / 지출 / 재고 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierKind {
    General,
    DentalLab,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub kind: SupplierKind,
}

/// 거래처 청구서에 대한 지급 배분 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub expense_id: String,
    pub amount: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierInvoice {
    pub id: String,
    pub supplier_id: String,
    pub invoice_number: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    pub payments: Vec<InvoicePayment>,
    pub notes: Option<String>,
    /// 기공 의뢰 비용에서 생성된 청구서
    pub lab_case_id: Option<String>,
}

impl SupplierInvoice {
    pub fn paid_amount(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn balance(&self) -> f64 {
        self.amount - self.paid_amount()
    }

    pub fn status(&self) -> InvoiceStatus {
        let paid = self.paid_amount();
        if paid <= 0.0 {
            InvoiceStatus::Unpaid
        } else if paid < self.amount {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Paid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Salaries,
    Supplies,
    LabFees,
    Utilities,
    Equipment,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: ExpenseCategory,
    pub method: PaymentMethod,
    pub supplier_id: Option<String>,
    pub supplier_invoice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub min_quantity: f64,
    pub unit_cost: f64,
    pub supplier_id: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

// ============ 기공 의뢰 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabCaseStatus {
    Draft,
    Pending,
    SentToLab,
    ReceivedFromLab,
    FittedToPatient,
    Cancelled,
}

impl LabCaseStatus {
    /// 작성 중 단계 (비용 미확정)
    pub fn is_drafting(&self) -> bool {
        matches!(self, LabCaseStatus::Draft | LabCaseStatus::Pending)
    }

    pub fn realizes_cost(&self) -> bool {
        !self.is_drafting() && *self != LabCaseStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabCase {
    pub id: String,
    pub patient_id: String,
    pub dentist_id: String,
    /// 기공소 (거래처 ID)
    pub lab_id: String,
    pub case_type: String,
    pub shade: Option<String>,
    pub status: LabCaseStatus,
    pub sent_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub cost: f64,
    pub notes: Option<String>,
}

// ============ 처방 / 첨부 ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub dentist_id: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub id: String,
    pub prescription_id: String,
    pub medication_name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientAttachment {
    pub id: String,
    pub patient_id: String,
    pub file_name: String,
    pub file_type: Option<String>,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

// ============ 설정 (로컬 전용) ============

/// 병원 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicProfile {
    pub clinic_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub license_number: Option<String>,
    pub currency: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ClinicProfile {
    fn default() -> Self {
        Self {
            clinic_name: String::new(),
            address: None,
            phone: None,
            email: None,
            license_number: None,
            currency: "USD".to_string(),
            updated_at: None,
        }
    }
}

/// 메시지 템플릿. `{patient_name}` 같은 자리표시자는 발송 쪽에서 치환
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplates {
    pub appointment_reminder: String,
    pub payment_receipt: String,
    pub lab_case_ready: String,
}
