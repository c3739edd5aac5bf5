//! 메모리 원격 저장소 (테스트용)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RemoteStore, Session};
use crate::error::{AppError, AppResult};
use crate::mapping::{Row, Table, OWNER_COLUMN};

/// 행을 메모리에 보관하는 저장소. 쓰기 실패를 주입할 수 있음
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    fail_table: RwLock<Option<Table>>,
    fail_on_write: RwLock<Option<usize>>,
    fail_on_read: RwLock<bool>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이 테이블에 대한 모든 쓰기를 실패시킴
    pub async fn set_fail_writes_to(&self, table: Option<Table>) {
        *self.fail_table.write().await = table;
    }

    /// n번째 쓰기(1부터)를 실패시킴. 카운트는 생성 이후 누적
    pub async fn set_fail_on_write(&self, nth: Option<usize>) {
        *self.fail_on_write.write().await = nth;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// 시도된 쓰기 수 (실패 포함)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 모든 세션의 행
    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// 원격 트리거나 다른 클라이언트가 쓴 행을 흉내낼 때 사용
    pub async fn seed(&self, table: Table, rows: Vec<Row>) {
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().extend(rows);
    }

    async fn check_write(&self, table: Table) -> AppResult<()> {
        let nth = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_table = *self.fail_table.read().await;
        let fail_nth = *self.fail_on_write.read().await;
        if fail_table == Some(table) || fail_nth == Some(nth) {
            return Err(AppError::RemoteWrite {
                table: table.as_str(),
                message: format!("injected failure on write #{}", nth),
            });
        }
        Ok(())
    }
}

fn owned_by(row: &Row, session: &Session) -> bool {
    row.get(OWNER_COLUMN).and_then(Value::as_str) == Some(session.user_id.as_str())
}

fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select_all(&self, table: Table, session: &Session) -> AppResult<Vec<Row>> {
        if *self.fail_on_read.read().await {
            return Err(AppError::RemoteRead {
                table: table.as_str(),
                message: "injected read failure".to_string(),
            });
        }
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| owned_by(r, session)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, session: &Session, rows: Vec<Row>) -> AppResult<Vec<Row>> {
        self.check_write(table).await?;
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table).or_default();
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            if row_id(&row).map_or(true, str::is_empty) {
                row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }
            row.insert(
                OWNER_COLUMN.to_string(),
                Value::String(session.user_id.clone()),
            );
            if stored.iter().any(|r| row_id(r) == row_id(&row)) {
                return Err(AppError::RemoteWrite {
                    table: table.as_str(),
                    message: "duplicate key value violates unique constraint".to_string(),
                });
            }
            stored.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, table: Table, session: &Session, id: &str, row: Row) -> AppResult<Row> {
        self.check_write(table).await?;
        let mut tables = self.tables.write().await;
        let existing = tables
            .get_mut(&table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|r| row_id(r) == Some(id) && owned_by(r, session))
            })
            .ok_or_else(|| AppError::RemoteWrite {
                table: table.as_str(),
                message: format!("no row with id {}", id),
            })?;
        for (column, value) in row {
            if column != "id" && column != OWNER_COLUMN {
                existing.insert(column, value);
            }
        }
        Ok(existing.clone())
    }

    async fn delete(&self, table: Table, session: &Session, id: &str) -> AppResult<()> {
        self.check_write(table).await?;
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&table) {
            rows.retain(|r| !(row_id(r) == Some(id) && owned_by(r, session)));
        }
        Ok(())
    }

    async fn delete_all(&self, table: Table, session: &Session) -> AppResult<()> {
        self.check_write(table).await?;
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&table) {
            rows.retain(|r| !owned_by(r, session));
        }
        Ok(())
    }
}
