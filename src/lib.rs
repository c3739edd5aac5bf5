//! 치과 클리닉 데이터 동기화 / 정산 코어
//!
//! 원격(Supabase) 테이블을 메모리 엔티티 저장소에 캐시하고, 모든 변경을
//! 원격에 먼저 쓴 뒤 확인된 결과만 반영합니다. 수납 배분, 의사 지급,
//! 청구서 지급 같은 연쇄 작업과 로컬 설정 저장을 함께 제공합니다.

mod cascade;
pub mod clinic;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod mapping;
pub mod models;
pub mod remote;
pub mod settings;
pub mod snapshot;
pub mod split;
pub mod store;

pub use clinic::Clinic;
pub use config::{CoreConfig, RefetchPolicy, SupabaseConfig};
pub use error::{AppError, AppResult};
pub use ledger::Ledger;
pub use mapping::{RemoteEntity, Row, Table};
pub use remote::{MemoryStore, RemoteStore, Session, SupabaseStore};
pub use settings::SettingsStore;
pub use snapshot::{RestoreSummary, Snapshot};
pub use store::EntityStore;
