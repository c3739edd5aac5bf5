//! 로컬 설정 저장소
//!
//! 병원 정보와 메시지 템플릿은 원격 저장소와 별개로 로컬 SQLite 의 고정 키에
//! 저장됩니다. 시작 시 한 번 읽고 변경할 때마다 바로 씁니다.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{ClinicProfile, MessageTemplates};

const PROFILE_KEY: &str = "clinic_profile";
const TEMPLATES_KEY: &str = "message_templates";

static DEFAULT_TEMPLATES: Lazy<MessageTemplates> = Lazy::new(|| MessageTemplates {
    appointment_reminder: "Hello {patient_name}, this is a reminder of your appointment at \
                           {clinic_name} on {appointment_date} at {appointment_time}."
        .to_string(),
    payment_receipt: "Thank you {patient_name}. We received your payment of {amount} on {date}."
        .to_string(),
    lab_case_ready: "Hello {patient_name}, your {case_type} is ready. Please call {clinic_phone} \
                     to book a fitting."
        .to_string(),
});

impl Default for MessageTemplates {
    fn default() -> Self {
        DEFAULT_TEMPLATES.clone()
    }
}

pub struct SettingsStore {
    conn: Mutex<Connection>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        log::info!("Settings database opened at {}", path.display());
        Self::init(conn)
    }

    /// 플랫폼 로컬 데이터 디렉터리의 settings.db
    pub fn open_default() -> AppResult<Self> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| AppError::Custom("Cannot find data directory".to_string()))?;
        Self::open(&data_dir.join("clinic-core").join("settings.db"))
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Custom("Settings lock error".to_string()))
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let text = serde_json::to_string(value)?;
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![key, text, Utc::now().to_rfc3339()],
        )?;
        log::debug!("Saved setting '{}'", key);
        Ok(())
    }

    /// 저장된 값이 없으면 기본 병원 정보
    pub fn profile(&self) -> AppResult<ClinicProfile> {
        Ok(self.get(PROFILE_KEY)?.unwrap_or_default())
    }

    pub fn save_profile(&self, profile: &ClinicProfile) -> AppResult<ClinicProfile> {
        let mut saved = profile.clone();
        saved.updated_at = Some(Utc::now());
        self.put(PROFILE_KEY, &saved)?;
        Ok(saved)
    }

    pub fn templates(&self) -> AppResult<MessageTemplates> {
        Ok(self.get(TEMPLATES_KEY)?.unwrap_or_default())
    }

    pub fn save_templates(&self, templates: &MessageTemplates) -> AppResult<()> {
        self.put(TEMPLATES_KEY, templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_store_returns_defaults() {
        let store = SettingsStore::open_in_memory().unwrap();
        assert_eq!(store.profile().unwrap(), ClinicProfile::default());
        let templates = store.templates().unwrap();
        assert!(templates.appointment_reminder.contains("{patient_name}"));
    }

    #[test]
    fn profile_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.db");

        let profile = ClinicProfile {
            clinic_name: "Smile Dental".to_string(),
            phone: Some("02-123-4567".to_string()),
            currency: "KRW".to_string(),
            ..ClinicProfile::default()
        };
        let saved = {
            let store = SettingsStore::open(&path).unwrap();
            store.save_profile(&profile).unwrap()
        };
        assert!(saved.updated_at.is_some());

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.profile().unwrap(), saved);
    }

    #[test]
    fn saving_templates_overwrites_previous_value() {
        let store = SettingsStore::open_in_memory().unwrap();
        let mut templates = store.templates().unwrap();
        templates.payment_receipt = "Paid: {amount}".to_string();
        store.save_templates(&templates).unwrap();

        templates.lab_case_ready = "Ready".to_string();
        store.save_templates(&templates).unwrap();

        let loaded = store.templates().unwrap();
        assert_eq!(loaded.payment_receipt, "Paid: {amount}");
        assert_eq!(loaded.lab_case_ready, "Ready");
    }

    #[test]
    fn corrupt_value_is_reported() {
        let store = SettingsStore::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, 'not json', '')",
                params![PROFILE_KEY],
            )
            .unwrap();
        assert!(matches!(
            store.profile(),
            Err(AppError::Serialization(_))
        ));
    }
}
