//! 변경 게이트웨이
//!
//! 엔티티 타입별 add/update/delete 를 원격 저장소에 쓰고, 확인된 결과만
//! 로컬 저장소에 반영합니다. 실패한 쓰기는 로컬 상태를 바꾸지 않습니다.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::RefetchPolicy;
use crate::error::{AppError, AppResult};
use crate::mapping::{RemoteEntity, Row, Table, OWNER_COLUMN};
use crate::models::*;
use crate::remote::{RemoteStore, Session};
use crate::store::EntityStore;

#[derive(Clone)]
pub struct Gateway {
    remote: Arc<dyn RemoteStore>,
    session: Session,
    state: Arc<RwLock<EntityStore>>,
    refetch: RefetchPolicy,
}

impl Gateway {
    pub fn new(remote: Arc<dyn RemoteStore>, session: Session, refetch: RefetchPolicy) -> Self {
        Self {
            remote,
            session,
            state: Arc::new(RwLock::new(EntityStore::default())),
            refetch,
        }
    }

    pub fn state(&self) -> &Arc<RwLock<EntityStore>> {
        &self.state
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub async fn snapshot(&self) -> EntityStore {
        self.state.read().await.clone()
    }

    fn owned_row<E: RemoteEntity>(&self, entity: &E) -> Row {
        let mut row = entity.to_storage();
        row.insert(
            OWNER_COLUMN.to_string(),
            Value::String(self.session.user_id.clone()),
        );
        row
    }

    /// 삽입 후 권위 있는 행을 로컬에 추가. 재조회는 하지 않음
    pub async fn insert<E: RemoteEntity>(&self, partial: &E) -> AppResult<E> {
        partial.validate()?;
        let row = self.owned_row(partial);
        let rows = self.remote.insert(E::TABLE, &self.session, vec![row]).await?;

        let inserted = rows
            .iter()
            .map(E::from_storage)
            .collect::<AppResult<Vec<E>>>()?;
        let first = inserted.first().cloned().ok_or_else(|| AppError::RemoteWrite {
            table: E::TABLE.as_str(),
            message: "insert returned no rows".to_string(),
        })?;

        {
            let mut state = self.state.write().await;
            for entity in inserted {
                state.upsert(entity);
            }
        }
        log::debug!("Added {} {}", E::NAME, first.id());
        Ok(first)
    }

    /// 삽입 후 원격 부작용까지 흡수하도록 재조회
    pub async fn add<E: RemoteEntity>(&self, partial: &E) -> AppResult<E> {
        let added = self.insert(partial).await?;
        self.reconcile(&[E::TABLE]).await;
        Ok(added)
    }

    /// 변경 가능한 모든 필드를 ID 기준으로 쓰고 로컬 항목을 교체
    pub async fn update<E: RemoteEntity>(&self, entity: &E) -> AppResult<E> {
        entity.validate()?;
        if entity.id().is_empty() {
            return Err(AppError::Validation(format!(
                "cannot update {} without an id",
                E::NAME
            )));
        }
        let row = self.owned_row(entity);
        let stored = self
            .remote
            .update(E::TABLE, &self.session, entity.id(), row)
            .await?;
        let updated = E::from_storage(&stored)?;

        self.state.write().await.upsert(updated.clone());
        log::debug!("Updated {} {}", E::NAME, updated.id());
        Ok(updated)
    }

    pub async fn delete<E: RemoteEntity>(&self, id: &str) -> AppResult<()> {
        self.remote.delete(E::TABLE, &self.session, id).await?;
        self.state.write().await.remove::<E>(id);
        log::debug!("Deleted {} {}", E::NAME, id);
        Ok(())
    }

    /// 모든 컬렉션 재조회. 하나라도 실패하면 로컬 상태는 그대로
    pub async fn refetch_all(&self) -> AppResult<()> {
        let mut fresh = EntityStore::default();
        for table in Table::ALL {
            self.load_table(table, &mut fresh).await?;
        }
        *self.state.write().await = fresh;
        log::info!("Refetched all collections");
        Ok(())
    }

    pub async fn refetch_tables(&self, tables: &[Table]) -> AppResult<()> {
        let mut fresh = EntityStore::default();
        for table in tables {
            self.load_table(*table, &mut fresh).await?;
        }
        let mut state = self.state.write().await;
        for table in tables {
            state.take_table(*table, &mut fresh);
        }
        Ok(())
    }

    /// 쓰기 이후 재조회. 쓰기는 이미 확인됐으므로 실패는 기록만 함
    pub async fn reconcile(&self, affected: &[Table]) {
        let result = match self.refetch {
            RefetchPolicy::Full => self.refetch_all().await,
            RefetchPolicy::Affected => self.refetch_tables(affected).await,
        };
        if let Err(e) = result {
            log::error!("Reconciliation refetch failed: {}", e);
        }
    }

    async fn load<E: RemoteEntity>(&self, into: &mut EntityStore) -> AppResult<()> {
        let rows = self.remote.select_all(E::TABLE, &self.session).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            match E::from_storage(row) {
                Ok(entity) => entities.push(entity),
                Err(e) => log::warn!("Skipping unreadable {} row: {}", E::NAME, e),
            }
        }
        into.replace_all(entities);
        Ok(())
    }

    async fn load_table(&self, table: Table, into: &mut EntityStore) -> AppResult<()> {
        match table {
            Table::Patients => self.load::<Patient>(into).await,
            Table::Dentists => self.load::<Dentist>(into).await,
            Table::Appointments => self.load::<Appointment>(into).await,
            Table::TreatmentDefinitions => self.load::<TreatmentDefinition>(into).await,
            Table::TreatmentRecords => self.load::<TreatmentRecord>(into).await,
            Table::Payments => self.load::<Payment>(into).await,
            Table::DoctorPayments => self.load::<DoctorPayment>(into).await,
            Table::Suppliers => self.load::<Supplier>(into).await,
            Table::SupplierInvoices => self.load::<SupplierInvoice>(into).await,
            Table::Expenses => self.load::<Expense>(into).await,
            Table::InventoryItems => self.load::<InventoryItem>(into).await,
            Table::LabCases => self.load::<LabCase>(into).await,
            Table::Prescriptions => self.load::<Prescription>(into).await,
            Table::PrescriptionItems => self.load::<PrescriptionItem>(into).await,
            Table::PatientAttachments => self.load::<PatientAttachment>(into).await,
        }
    }
}
