//! 연쇄 작업
//!
//! 주 쓰기 하나가 다른 장부 행까지 바꾸는 복합 작업입니다. 각 단계는 독립된
//! 원격 쓰기이고 앞 단계는 뒤 단계가 실패해도 되돌리지 않습니다. 실패한
//! 파생 단계는 `AppError::CascadeStep` 으로 보고됩니다.

use chrono::{NaiveDate, Utc};

use crate::clinic::Clinic;
use crate::error::{AppError, AppResult};
use crate::mapping::Table;
use crate::models::*;
use crate::split::{self, Split};
use crate::store::EntityStore;

const DOCTOR_PAYMENT_STEP: &str = "doctor_payment";
const INVOICE_PAYMENT_STEP: &str = "invoice_payment";
const LAB_INVOICE_STEP: &str = "lab_invoice";

fn cascade_failed(step: &'static str, source: AppError) -> AppError {
    log::error!("Cascade step '{}' failed: {}", step, source);
    AppError::cascade(step, source)
}

/// 수납에서 의사에게 적립할 대상
struct ShareCredit {
    dentist_id: String,
    note: String,
}

impl ShareCredit {
    fn doctor_payment(&self, payment: &Payment, amount: f64) -> DoctorPayment {
        DoctorPayment {
            id: String::new(),
            dentist_id: self.dentist_id.clone(),
            amount,
            date: payment.date,
            notes: Some(self.note.clone()),
            source_payment_id: Some(payment.id.clone()),
        }
    }
}

fn share_note(record: &TreatmentRecord) -> String {
    format!("share from treatment on {}", record.date_label())
}

/// 현재 진료 항목 배분율로 수납 배분 계산
fn price_payment(store: &EntityStore, payment: &Payment) -> AppResult<(Split, Option<ShareCredit>)> {
    let split = split::payment_split(
        store,
        payment.treatment_record_id.as_deref(),
        payment.amount,
    )?;
    let credit = match payment.treatment_record_id.as_deref() {
        Some(record_id) => {
            let (record, _) = split::linked_definition(store, record_id)?;
            Some(ShareCredit {
                dentist_id: record.dentist_id.clone(),
                note: share_note(record),
            })
        }
        None => None,
    };
    Ok((split, credit))
}

/// 수납에서 파생된 의사 지급 찾기
///
/// 역참조가 있으면 그것을 쓰고, 없으면 의사 + 날짜 + 이전 의사 몫 + 메모의
/// 진료일로 찾습니다. 후보가 둘 이상이면 찾지 못한 것으로 봅니다.
fn derived_doctor_payment<'a>(
    store: &'a EntityStore,
    payment: &Payment,
) -> Option<&'a DoctorPayment> {
    let linked = store
        .doctor_payments
        .iter()
        .find(|dp| dp.source_payment_id.as_deref() == Some(payment.id.as_str()));
    if linked.is_some() {
        return linked;
    }

    if payment.doctor_share <= 0.0 {
        return None;
    }
    let record = store.find::<TreatmentRecord>(payment.treatment_record_id.as_deref()?)?;
    let label = record.date_label();
    let candidates: Vec<&DoctorPayment> = store
        .doctor_payments
        .iter()
        .filter(|dp| {
            dp.source_payment_id.is_none()
                && dp.dentist_id == record.dentist_id
                && dp.date == payment.date
                && dp.amount == payment.doctor_share
                && dp.notes.as_deref().is_some_and(|n| n.contains(&label))
        })
        .collect();

    match candidates.as_slice() {
        [single] => Some(*single),
        [] => None,
        many => {
            log::warn!(
                "Payment {} matches {} doctor payments; leaving them untouched",
                payment.id,
                many.len()
            );
            None
        }
    }
}

impl Clinic {
    /// 진료 기록 추가. 배분액은 호출자가 준 값 그대로 고정
    pub async fn add_treatment_record(
        &self,
        patient_id: &str,
        record: &TreatmentRecord,
    ) -> AppResult<TreatmentRecord> {
        let mut record = record.clone();
        record.patient_id = patient_id.to_string();
        self.gateway().add(&record).await
    }

    /// 수납 추가
    ///
    /// 진료 기록에 연결된 수납은 현재 배분율로 나누고, 의사 몫이 있으면 의사
    /// 지급을 하나 만듭니다. 의사 지급 쓰기가 실패해도 수납은 남습니다.
    pub async fn add_payment(&self, payment: &Payment) -> AppResult<Payment> {
        payment.validate_amount()?;
        let (split, credit) = {
            let state = self.gateway().state().read().await;
            price_payment(&state, payment)?
        };

        let mut priced = payment.clone();
        priced.doctor_share = split.doctor_share;
        priced.clinic_share = split.clinic_share;
        let saved = self.gateway().insert(&priced).await?;

        let result = match credit {
            Some(credit) if split.doctor_share > 0.0 => self
                .gateway()
                .insert(&credit.doctor_payment(&saved, split.doctor_share))
                .await
                .map(|_| ())
                .map_err(|e| cascade_failed(DOCTOR_PAYMENT_STEP, e)),
            _ => Ok(()),
        };

        self.gateway()
            .reconcile(&[Table::Payments, Table::DoctorPayments])
            .await;
        result.map(|_| saved)
    }

    /// 수납 수정. 새 금액으로 다시 나누고 파생 의사 지급을 맞춤
    pub async fn update_payment(&self, payment: &Payment) -> AppResult<Payment> {
        payment.validate_amount()?;
        let (split, credit, existing) = {
            let state = self.gateway().state().read().await;
            let previous = state
                .find::<Payment>(&payment.id)
                .ok_or_else(|| AppError::not_found("Payment", &payment.id))?;
            let existing = derived_doctor_payment(&state, previous).cloned();
            let (split, credit) = price_payment(&state, payment)?;
            (split, credit, existing)
        };

        let mut priced = payment.clone();
        priced.doctor_share = split.doctor_share;
        priced.clinic_share = split.clinic_share;
        let saved = self.gateway().update(&priced).await?;

        let result = match (existing, credit) {
            (Some(existing), Some(credit)) if split.doctor_share > 0.0 => {
                let mut derived = credit.doctor_payment(&saved, split.doctor_share);
                derived.id = existing.id;
                self.gateway().update(&derived).await.map(|_| ())
            }
            (Some(existing), _) => self.gateway().delete::<DoctorPayment>(&existing.id).await,
            (None, Some(credit)) if split.doctor_share > 0.0 => self
                .gateway()
                .insert(&credit.doctor_payment(&saved, split.doctor_share))
                .await
                .map(|_| ()),
            (None, _) => Ok(()),
        }
        .map_err(|e| cascade_failed(DOCTOR_PAYMENT_STEP, e));

        self.gateway()
            .reconcile(&[Table::Payments, Table::DoctorPayments])
            .await;
        result.map(|_| saved)
    }

    /// 수납 삭제. 파생 의사 지급을 먼저 지우고, 그게 실패하면 수납은 그대로 둠
    pub async fn delete_payment(&self, id: &str) -> AppResult<()> {
        let derived_id = {
            let state = self.gateway().state().read().await;
            let payment = state
                .find::<Payment>(id)
                .ok_or_else(|| AppError::not_found("Payment", id))?;
            derived_doctor_payment(&state, payment).map(|dp| dp.id.clone())
        };

        if let Some(derived_id) = derived_id {
            self.gateway()
                .delete::<DoctorPayment>(&derived_id)
                .await
                .map_err(|e| cascade_failed(DOCTOR_PAYMENT_STEP, e))?;
        }
        self.gateway().delete::<Payment>(id).await?;

        self.gateway()
            .reconcile(&[Table::Payments, Table::DoctorPayments])
            .await;
        Ok(())
    }

    /// 지출 추가. 청구서를 참조하면 청구서의 지급 목록에 한 줄 추가
    pub async fn add_expense(&self, expense: &Expense) -> AppResult<Expense> {
        let saved = self.gateway().insert(expense).await?;

        let result = match saved.supplier_invoice_id.as_deref() {
            Some(invoice_id) => self
                .record_invoice_payment(invoice_id, &saved)
                .await
                .map_err(|e| cascade_failed(INVOICE_PAYMENT_STEP, e)),
            None => Ok(()),
        };

        self.gateway()
            .reconcile(&[Table::Expenses, Table::SupplierInvoices])
            .await;
        result.map(|_| saved)
    }

    async fn record_invoice_payment(&self, invoice_id: &str, expense: &Expense) -> AppResult<()> {
        // 원격이 아닌 캐시에서 읽음. 다른 클라이언트와 겹치면 마지막 쓰기가 이김
        let mut invoice = self
            .gateway()
            .state()
            .read()
            .await
            .find::<SupplierInvoice>(invoice_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("SupplierInvoice", invoice_id))?;

        if invoice.payments.iter().any(|p| p.expense_id == expense.id) {
            log::debug!(
                "Expense {} already recorded on invoice {}",
                expense.id,
                invoice_id
            );
            return Ok(());
        }
        invoice.payments.push(InvoicePayment {
            expense_id: expense.id.clone(),
            amount: expense.amount,
            date: expense.date,
        });

        let invoice = self.gateway().update(&invoice).await?;
        log::info!(
            "Invoice {} is {:?} ({} of {})",
            invoice.id,
            invoice.status(),
            invoice.paid_amount(),
            invoice.amount
        );
        Ok(())
    }

    /// 청구서 잔액 지급. 잔액이 없으면 아무것도 쓰지 않고 None
    pub async fn pay_supplier_invoice(
        &self,
        invoice_id: &str,
        method: PaymentMethod,
        date: NaiveDate,
    ) -> AppResult<Option<Expense>> {
        let (invoice, kind) = {
            let state = self.gateway().state().read().await;
            let invoice = state
                .find::<SupplierInvoice>(invoice_id)
                .cloned()
                .ok_or_else(|| AppError::not_found("SupplierInvoice", invoice_id))?;
            let kind = state
                .find::<Supplier>(&invoice.supplier_id)
                .map(|s| s.kind)
                .unwrap_or(SupplierKind::General);
            (invoice, kind)
        };

        let balance = invoice.balance();
        if balance <= 0.0 {
            log::info!("Invoice {} has no balance to pay", invoice_id);
            return Ok(None);
        }

        let expense = Expense {
            id: String::new(),
            date,
            description: format!(
                "Payment for invoice {}",
                invoice.invoice_number.as_deref().unwrap_or(&invoice.id)
            ),
            amount: balance,
            category: match kind {
                SupplierKind::DentalLab => ExpenseCategory::LabFees,
                SupplierKind::General => ExpenseCategory::Supplies,
            },
            method,
            supplier_id: Some(invoice.supplier_id.clone()),
            supplier_invoice_id: Some(invoice.id.clone()),
        };
        self.add_expense(&expense).await.map(Some)
    }

    /// 기공 의뢰 추가. 작성 단계를 지난 상태로 만들면 바로 청구서 생성
    pub async fn add_lab_case(&self, case: &LabCase) -> AppResult<LabCase> {
        let saved = self.gateway().insert(case).await?;

        let result = if saved.status.realizes_cost() {
            self.realize_lab_cost(&saved).await
        } else {
            Ok(())
        };

        self.gateway()
            .reconcile(&[Table::LabCases, Table::SupplierInvoices])
            .await;
        result.map(|_| saved)
    }

    /// 기공 의뢰 수정. 작성 단계에서 벗어나는 순간 비용을 청구서로 확정
    pub async fn update_lab_case(&self, case: &LabCase) -> AppResult<LabCase> {
        let previous = self
            .gateway()
            .state()
            .read()
            .await
            .find::<LabCase>(&case.id)
            .map(|c| c.status)
            .ok_or_else(|| AppError::not_found("LabCase", &case.id))?;

        let saved = self.gateway().update(case).await?;

        let result = if previous.is_drafting() && saved.status.realizes_cost() {
            self.realize_lab_cost(&saved).await
        } else {
            Ok(())
        };

        self.gateway()
            .reconcile(&[Table::LabCases, Table::SupplierInvoices])
            .await;
        result.map(|_| saved)
    }

    async fn realize_lab_cost(&self, case: &LabCase) -> AppResult<()> {
        if case.cost <= 0.0 {
            return Ok(());
        }
        let invoiced = self
            .gateway()
            .state()
            .read()
            .await
            .supplier_invoices
            .iter()
            .any(|inv| inv.lab_case_id.as_deref() == Some(case.id.as_str()));
        if invoiced {
            log::debug!("Lab case {} already has an invoice", case.id);
            return Ok(());
        }

        let invoice = SupplierInvoice {
            id: String::new(),
            supplier_id: case.lab_id.clone(),
            invoice_number: None,
            invoice_date: case.sent_date.unwrap_or_else(|| Utc::now().date_naive()),
            due_date: case.due_date,
            amount: case.cost,
            payments: Vec::new(),
            notes: Some(format!("Lab case: {}", case.case_type)),
            lab_case_id: Some(case.id.clone()),
        };
        let invoice = self
            .gateway()
            .insert(&invoice)
            .await
            .map_err(|e| cascade_failed(LAB_INVOICE_STEP, e))?;
        log::info!(
            "Invoiced lab case {} to {} for {}",
            case.id,
            invoice.supplier_id,
            invoice.amount
        );
        Ok(())
    }
}
