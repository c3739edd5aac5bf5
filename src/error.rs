use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// 원격 저장소가 단일 테이블 쓰기를 거부함 (검증, 권한, 연결)
    #[error("Remote write to {table} failed: {message}")]
    RemoteWrite { table: &'static str, message: String },

    #[error("Remote read from {table} failed: {message}")]
    RemoteRead { table: &'static str, message: String },

    /// 주 쓰기는 이미 반영된 뒤 파생 쓰기가 실패함
    #[error("Cascade step '{step}' failed after the primary write: {source}")]
    CascadeStep {
        step: &'static str,
        #[source]
        source: Box<AppError>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Mapping error in {table}: {message}")]
    Mapping { table: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl AppError {
    pub(crate) fn cascade(step: &'static str, source: AppError) -> Self {
        AppError::CascadeStep {
            step,
            source: Box::new(source),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_error_names_the_step_and_cause() {
        let err = AppError::cascade(
            "doctor_payment",
            AppError::RemoteWrite {
                table: "doctor_payments",
                message: "permission denied".to_string(),
            },
        );
        let text = err.to_string();
        assert!(text.contains("doctor_payment"));
        assert!(text.contains("permission denied"));
    }

    #[test]
    fn serializes_as_display_string() {
        let err = AppError::not_found("Payment", "p-1");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Payment not found: p-1\"");
    }
}
