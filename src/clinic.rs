//! 클리닉 코어 진입점
//!
//! 표시 계층이 호출하는 작업 모음입니다. 엔티티 타입마다 일반 add/update/delete
//! 를 제공하고, 연쇄가 필요한 복합 작업은 `cascade` 모듈에 있습니다.

use std::sync::Arc;

use crate::config::{CoreConfig, SupabaseConfig};
use crate::error::AppResult;
use crate::gateway::Gateway;
use crate::ledger::Ledger;
use crate::mapping::RemoteEntity;
use crate::remote::{RemoteStore, Session, SupabaseStore};
use crate::store::EntityStore;

pub struct Clinic {
    gateway: Gateway,
}

impl Clinic {
    pub fn new(remote: Arc<dyn RemoteStore>, session: Session, config: &CoreConfig) -> Self {
        Self {
            gateway: Gateway::new(remote, session, config.refetch),
        }
    }

    /// Supabase 에 연결. 데이터는 `load()` 를 호출해야 채워짐
    pub fn connect(
        supabase: SupabaseConfig,
        session: Session,
        config: &CoreConfig,
    ) -> AppResult<Self> {
        log::info!("Connecting to {} as {}", supabase.url, session.user_id);
        let remote = SupabaseStore::new(supabase, config)?;
        Ok(Self::new(Arc::new(remote), session, config))
    }

    pub fn session(&self) -> &Session {
        self.gateway.session()
    }

    pub(crate) fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// 초기 전체 조회
    pub async fn load(&self) -> AppResult<()> {
        self.gateway.refetch_all().await
    }

    pub async fn refresh(&self) -> AppResult<()> {
        self.gateway.refetch_all().await
    }

    pub async fn entities<E: RemoteEntity>(&self) -> Vec<E> {
        self.gateway.state().read().await.all::<E>().to_vec()
    }

    pub async fn find<E: RemoteEntity>(&self, id: &str) -> Option<E> {
        self.gateway.state().read().await.find::<E>(id).cloned()
    }

    /// 현재 확인된 상태 전체 복사본
    pub async fn snapshot(&self) -> EntityStore {
        self.gateway.snapshot().await
    }

    pub async fn ledger(&self) -> Ledger {
        Ledger::new(self.snapshot().await)
    }

    /// 연쇄 없는 추가. 수납/지출/기공 의뢰는 cascade 쪽 작업을 사용
    pub async fn add<E: RemoteEntity>(&self, partial: &E) -> AppResult<E> {
        self.gateway.add(partial).await
    }

    pub async fn update<E: RemoteEntity>(&self, entity: &E) -> AppResult<E> {
        self.gateway.update(entity).await
    }

    pub async fn delete<E: RemoteEntity>(&self, id: &str) -> AppResult<()> {
        self.gateway.delete::<E>(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefetchPolicy;
    use crate::error::AppError;
    use crate::models::{Patient, Payment, PaymentMethod, TreatmentDefinition};
    use crate::remote::MemoryStore;

    fn clinic(store: Arc<MemoryStore>) -> Clinic {
        Clinic::new(
            store,
            Session::new("user-1", ""),
            &CoreConfig::default().with_refetch(RefetchPolicy::Full),
        )
    }

    #[tokio::test]
    async fn generic_operations_read_back_through_cache() {
        let store = Arc::new(MemoryStore::new());
        let clinic = clinic(store);
        clinic.load().await.unwrap();
        assert!(clinic.entities::<Patient>().await.is_empty());

        let added = clinic.add(&Patient::new("Kim")).await.unwrap();
        assert_eq!(clinic.find::<Patient>(&added.id).await, Some(added.clone()));

        let mut moved = added.clone();
        moved.address = Some("Seoul".to_string());
        clinic.update(&moved).await.unwrap();
        assert_eq!(
            clinic.find::<Patient>(&added.id).await.unwrap().address.as_deref(),
            Some("Seoul")
        );

        clinic.delete::<Patient>(&added.id).await.unwrap();
        assert!(clinic.entities::<Patient>().await.is_empty());
    }

    #[tokio::test]
    async fn definition_update_breaking_percentages_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let clinic = clinic(store.clone());
        let mut def = clinic
            .add(&TreatmentDefinition::new("Scaling", 80.0, 0.3))
            .await
            .unwrap();
        let writes = store.write_count();

        def.doctor_percentage = 0.5;
        assert!(clinic.update(&def).await.is_err());
        assert_eq!(store.write_count(), writes);
        assert_eq!(
            clinic
                .find::<TreatmentDefinition>(&def.id)
                .await
                .unwrap()
                .doctor_percentage,
            0.3
        );
    }

    #[tokio::test]
    async fn payment_update_with_unbalanced_shares_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let clinic = clinic(store.clone());
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut payment = clinic
            .add(&Payment::new("pat-1", 200.0, PaymentMethod::Cash, date))
            .await
            .unwrap();
        let writes = store.write_count();

        payment.amount = 500.0;
        let err = clinic.update(&payment).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.write_count(), writes);

        let stored = clinic.find::<Payment>(&payment.id).await.unwrap();
        assert_eq!(stored.amount, 200.0);
        assert_eq!(stored.clinic_share, 200.0);

        let mut unbalanced = Payment::new("pat-1", 100.0, PaymentMethod::Cash, date);
        unbalanced.doctor_share = 30.0;
        assert!(clinic.add(&unbalanced).await.is_err());
        assert_eq!(store.write_count(), writes);
    }
}
