//! 코어 설정
//!
//! Supabase 연결 정보와 동기화 동작 방식을 정의합니다.

use crate::error::{AppError, AppResult};
use std::time::Duration;

/// Supabase 설정
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    /// `SUPABASE_URL`, `SUPABASE_ANON_KEY` 환경 변수에서 읽기
    pub fn from_env() -> AppResult<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| AppError::Custom("SUPABASE_URL is not set".to_string()))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| AppError::Custom("SUPABASE_ANON_KEY is not set".to_string()))?;
        Ok(Self::new(&url, &anon_key))
    }
}

/// 쓰기 이후 재조회 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefetchPolicy {
    /// 모든 컬렉션 재조회 (원격 트리거 부작용까지 흡수)
    #[default]
    Full,
    /// 작업과 선언된 연쇄 규칙이 건드리는 컬렉션만 재조회
    Affected,
}

#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub refetch: RefetchPolicy,
    /// None 이면 원격 호출에 타임아웃을 두지 않음
    pub request_timeout: Option<Duration>,
}

impl CoreConfig {
    pub fn with_refetch(mut self, refetch: RefetchPolicy) -> Self {
        self.refetch = refetch;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
