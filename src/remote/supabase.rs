//! Supabase REST 저장소

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use super::{RemoteStore, Session};
use crate::config::{CoreConfig, SupabaseConfig};
use crate::error::{AppError, AppResult};
use crate::mapping::{Row, Table, OWNER_COLUMN};

pub struct SupabaseStore {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig, core: &CoreConfig) -> AppResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = core.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Custom(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.config.url, table.as_str())
    }

    /// 공통 헤더. 액세스 토큰이 없으면 anon_key 로 요청
    fn authorize(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        let bearer = if session.access_token.is_empty() {
            &self.config.anon_key
        } else {
            &session.access_token
        };
        request
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
    }

    fn owner_filter(session: &Session) -> (&'static str, String) {
        (OWNER_COLUMN, format!("eq.{}", session.user_id))
    }
}

fn write_error(table: Table, message: impl std::fmt::Display) -> AppError {
    log::warn!("Supabase write to {} failed: {}", table, message);
    AppError::RemoteWrite {
        table: table.as_str(),
        message: message.to_string(),
    }
}

fn read_error(table: Table, message: impl std::fmt::Display) -> AppError {
    log::warn!("Supabase read from {} failed: {}", table, message);
    AppError::RemoteRead {
        table: table.as_str(),
        message: message.to_string(),
    }
}

/// 실패 응답이면 상태 코드와 본문으로 오류 메시지 생성
async fn error_body(response: Response) -> Result<Response, String> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(format!("Supabase error {}: {}", status, body))
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    async fn select_all(&self, table: Table, session: &Session) -> AppResult<Vec<Row>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[Self::owner_filter(session), ("select", "*".to_string())]);
        let response = self
            .authorize(request, session)
            .send()
            .await
            .map_err(|e| read_error(table, e))?;
        let response = error_body(response)
            .await
            .map_err(|e| read_error(table, e))?;
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| read_error(table, e))
    }

    async fn insert(&self, table: Table, session: &Session, rows: Vec<Row>) -> AppResult<Vec<Row>> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self
            .authorize(request, session)
            .send()
            .await
            .map_err(|e| write_error(table, e))?;
        let response = error_body(response)
            .await
            .map_err(|e| write_error(table, e))?;
        let inserted = response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| write_error(table, e))?;
        log::debug!("Inserted {} row(s) into {}", inserted.len(), table);
        Ok(inserted)
    }

    async fn update(&self, table: Table, session: &Session, id: &str, row: Row) -> AppResult<Row> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{}", id)), Self::owner_filter(session)])
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self
            .authorize(request, session)
            .send()
            .await
            .map_err(|e| write_error(table, e))?;
        let response = error_body(response)
            .await
            .map_err(|e| write_error(table, e))?;
        let mut updated = response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| write_error(table, e))?;
        // PATCH 는 일치하는 행이 없어도 성공 응답
        if updated.is_empty() {
            return Err(write_error(table, format!("no row with id {}", id)));
        }
        log::debug!("Updated {} in {}", id, table);
        Ok(updated.swap_remove(0))
    }

    async fn delete(&self, table: Table, session: &Session, id: &str) -> AppResult<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{}", id)), Self::owner_filter(session)]);
        let response = self
            .authorize(request, session)
            .send()
            .await
            .map_err(|e| write_error(table, e))?;
        error_body(response)
            .await
            .map_err(|e| write_error(table, e))?;
        log::debug!("Deleted {} from {}", id, table);
        Ok(())
    }

    async fn delete_all(&self, table: Table, session: &Session) -> AppResult<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&[Self::owner_filter(session)]);
        let response = self
            .authorize(request, session)
            .send()
            .await
            .map_err(|e| write_error(table, e))?;
        error_body(response)
            .await
            .map_err(|e| write_error(table, e))?;
        log::info!("Cleared {} for session", table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_rest_urls_per_table() {
        let store = SupabaseStore::new(
            SupabaseConfig::new("https://demo.supabase.co/", "anon"),
            &CoreConfig::default(),
        )
        .unwrap();
        assert_eq!(
            store.table_url(Table::DoctorPayments),
            "https://demo.supabase.co/rest/v1/doctor_payments"
        );
    }

    #[test]
    fn owner_filter_uses_session_user() {
        let session = Session::new("user-42", "");
        let (column, filter) = SupabaseStore::owner_filter(&session);
        assert_eq!(column, "user_id");
        assert_eq!(filter, "eq.user-42");
    }
}
