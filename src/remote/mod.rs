//! 원격 저장소 계약
//!
//! 엔티티 타입마다 논리 테이블 하나가 있고, 모든 행은 세션 소유자(`user_id`)
//! 범위로 묶입니다. 구현체:
//! - `SupabaseStore`: Supabase REST (PostgREST)
//! - `MemoryStore`: 테스트용 메모리 저장소 (실패 주입 지원)

mod memory;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::mapping::{Row, Table};

/// 로그인 세션 (소유자 ID + 액세스 토큰)
#[derive(Clone)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: &str, access_token: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// 원격 영속 계층
///
/// 쓰기 실패는 `RemoteWrite`, 조회 실패는 `RemoteRead` 로 보고합니다.
/// 쓰기 호출은 저장된 권위 있는 행을 돌려줍니다.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 세션 소유 행 전체 조회
    async fn select_all(&self, table: Table, session: &Session) -> AppResult<Vec<Row>>;

    /// 삽입 후 저장된 행 반환 (ID는 저장소가 부여할 수 있음)
    async fn insert(&self, table: Table, session: &Session, rows: Vec<Row>) -> AppResult<Vec<Row>>;

    /// ID로 갱신 후 저장된 행 반환
    async fn update(&self, table: Table, session: &Session, id: &str, row: Row) -> AppResult<Row>;

    async fn delete(&self, table: Table, session: &Session, id: &str) -> AppResult<()>;

    /// 세션 소유 행 전체 삭제 (일괄 복원용)
    async fn delete_all(&self, table: Table, session: &Session) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_hides_token() {
        let session = Session::new("user-1", "secret-token");
        let text = format!("{:?}", session);
        assert!(text.contains("user-1"));
        assert!(!text.contains("secret-token"));
    }
}
