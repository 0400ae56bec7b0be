use serde::Serialize;

use crate::processor::{ApplicationId, ProcessError, ProcessedApplication};

/// Caller-facing result of one processing run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    #[serde(rename_all = "camelCase")]
    Success {
        success: bool,
        application_id: ApplicationId,
    },
    Failure { error: String },
}

impl Reply {
    /// Every failure kind collapses into the same `{ "error": ... }` shape.
    pub fn from_result(result: &Result<ProcessedApplication, ProcessError>) -> Self {
        match result {
            Ok(processed) => Self::Success {
                success: true,
                application_id: processed.id.clone(),
            },
            Err(err) => Self::Failure {
                error: err.to_string(),
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Failure { .. } => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({ "error": format!("failed to render reply: {err}") })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::AnalysisError;
    use crate::status::ApplicationStatus;
    use serde_json::json;

    #[test]
    fn success_reply_echoes_id() {
        let reply = Reply::from_result(&Ok(ProcessedApplication {
            id: ApplicationId::from(json!(12)),
            status: ApplicationStatus::Approved,
        }));
        assert_eq!(reply.status_code(), 200);
        assert_eq!(reply.to_json(), json!({ "success": true, "applicationId": 12 }));
    }

    #[test]
    fn every_failure_is_a_500_with_message() {
        let failures = [
            ProcessError::Validation,
            ProcessError::Configuration("PYTHON_API_URL"),
            ProcessError::Storage("Object not found".into()),
            ProcessError::AnalysisService(AnalysisError::Status {
                status: 503,
                body: "overloaded".into(),
            }),
            ProcessError::Persistence("row locked".into()),
        ];
        for err in failures {
            let message = err.to_string();
            let reply = Reply::from_result(&Err(err));
            assert_eq!(reply.status_code(), 500);
            assert!(!reply.is_success());
            assert_eq!(reply.to_json(), json!({ "error": message }));
        }
    }
}
