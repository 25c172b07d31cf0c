// Typed endpoint groups over the gateway. These are thin wrappers: the
// backend owns the CRUD payload shapes, so bodies stay `serde_json::Value`
// and only the envelopes the SDK itself consumes get concrete types.
use crate::gateway::ApiClient;
use campus_common::{ApiError, DashboardConfig, Envelope, LoginData, LoginRequest, Result, UserProfile};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

fn decode<T: DeserializeOwned>(value: Value) -> Result<Envelope<T>> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::Network(format!("decode response body: {err}")))
}

/// Entry point for all endpoint groups.
#[derive(Clone)]
pub struct Api {
    client: Arc<ApiClient>,
}

impl Api {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn auth(&self) -> AuthApi {
        AuthApi {
            client: self.client.clone(),
        }
    }

    pub fn dashboard(&self) -> DashboardApi {
        DashboardApi {
            client: self.client.clone(),
        }
    }

    pub fn students(&self) -> StudentsApi {
        StudentsApi {
            client: self.client.clone(),
        }
    }

    pub fn teachers(&self) -> TeachersApi {
        TeachersApi {
            client: self.client.clone(),
        }
    }

    pub fn classes(&self) -> ClassesApi {
        ClassesApi {
            client: self.client.clone(),
        }
    }

    pub fn subjects(&self) -> SubjectsApi {
        SubjectsApi {
            client: self.client.clone(),
        }
    }

    pub fn fees(&self) -> FeesApi {
        FeesApi {
            client: self.client.clone(),
        }
    }

    pub fn features(&self) -> FeaturesApi {
        FeaturesApi {
            client: self.client.clone(),
        }
    }

    pub fn profile(&self) -> ProfileApi {
        ProfileApi {
            client: self.client.clone(),
        }
    }

    pub fn system(&self) -> SystemApi {
        SystemApi {
            client: self.client.clone(),
        }
    }
}

pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    /// Login goes through the suppressed path: a 401 here means bad
    /// credentials, not an expired session, and must not bounce the user
    /// off the page they are already on.
    pub async fn login(&self, request: &LoginRequest) -> Result<Envelope<LoginData>> {
        let body = serde_json::to_value(request)
            .map_err(|err| ApiError::Validation(format!("serialize login request: {err}")))?;
        let response = self
            .client
            .request_suppressed(reqwest::Method::POST, "/auth/login-user", Some(&body))
            .await?;
        decode(response)
    }

    pub async fn register(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/auth/register-user", body).await?)
    }

    pub async fn logout(&self) -> Result<Envelope<Value>> {
        decode(self.client.post_empty("/auth/logout-user").await?)
    }

    pub async fn logout_all(&self) -> Result<Envelope<Value>> {
        decode(self.client.post_empty("/auth/logout-all-devices").await?)
    }

    pub async fn profile(&self) -> Result<Envelope<UserProfile>> {
        decode(self.client.get("/auth/get-user-profile").await?)
    }

    pub async fn active_sessions(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/auth/get-active-sessions").await?)
    }

    pub async fn revoke_session(&self, session_id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .delete(&format!("/auth/revoke-session/{session_id}"))
                .await?,
        )
    }
}

pub struct DashboardApi {
    client: Arc<ApiClient>,
}

impl DashboardApi {
    pub async fn stats(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/dashboard/stats").await?)
    }

    pub async fn recent_activity(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/dashboard/recent-activity").await?)
    }

    pub async fn attendance_overview(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/dashboard/attendance-overview").await?)
    }

    pub async fn performance(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/dashboard/performance").await?)
    }

    /// Shell-mount config refresh: the normal path, where a 401 means the
    /// session expired and the global teardown applies.
    pub async fn config(&self) -> Result<Envelope<DashboardConfig>> {
        decode(self.client.get("/features/get-dashboard-config").await?)
    }

    /// Bootstrap-time config fetch: a 401 here means the config service
    /// rejected a brand-new token, which the login flow handles inline.
    pub async fn config_suppressed(&self) -> Result<Envelope<DashboardConfig>> {
        decode(
            self.client
                .get_suppressed("/features/get-dashboard-config")
                .await?,
        )
    }
}

pub struct StudentsApi {
    client: Arc<ApiClient>,
}

impl StudentsApi {
    pub async fn get_all(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/students/get-all-students").await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .get(&format!("/students/get-student-by-id/{id}"))
                .await?,
        )
    }

    pub async fn create(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/students/create-student", body).await?)
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<Envelope<Value>> {
        decode(
            self.client
                .put(&format!("/students/update-student-by-id/{id}"), body)
                .await?,
        )
    }

    pub async fn delete(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .delete(&format!("/students/delete-student-by-id/{id}"))
                .await?,
        )
    }

    pub async fn search(&self, query: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .get_with_query("/students/search", &[("q", query)])
                .await?,
        )
    }

    pub async fn grades(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/students/grades").await?)
    }

    pub async fn attendance(&self, id: &str) -> Result<Envelope<Value>> {
        decode(self.client.get(&format!("/students/{id}/attendance")).await?)
    }

    pub async fn performance(&self, id: &str) -> Result<Envelope<Value>> {
        decode(self.client.get(&format!("/students/{id}/performance")).await?)
    }
}

pub struct TeachersApi {
    client: Arc<ApiClient>,
}

impl TeachersApi {
    pub async fn get_all(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/teachers/get-all-teachers").await?)
    }

    pub async fn names(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/teachers/get-teacher-names").await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .get(&format!("/teachers/get-teacher-by-id/{id}"))
                .await?,
        )
    }

    pub async fn create(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/teachers/create-teacher", body).await?)
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<Envelope<Value>> {
        decode(
            self.client
                .put(&format!("/teachers/update-teacher-by-id/{id}"), body)
                .await?,
        )
    }

    pub async fn delete(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .delete(&format!("/teachers/delete-teacher-by-id/{id}"))
                .await?,
        )
    }

    pub async fn search(&self, query: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .get_with_query("/teachers/search", &[("q", query)])
                .await?,
        )
    }

    pub async fn departments(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/teachers/departments").await?)
    }
}

pub struct ClassesApi {
    client: Arc<ApiClient>,
}

impl ClassesApi {
    pub async fn get_all(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/classes/get-all-classes").await?)
    }

    pub async fn grades_and_classes(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/classes/grades-and-classes").await?)
    }

    pub async fn grades_options(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/classes/get-grades-options").await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Envelope<Value>> {
        decode(self.client.get(&format!("/classes/get-class-by-id/{id}")).await?)
    }

    pub async fn create(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/classes/create-new-class", body).await?)
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<Envelope<Value>> {
        decode(
            self.client
                .put(&format!("/classes/update-class/{id}"), body)
                .await?,
        )
    }

    pub async fn delete(&self, id: &str) -> Result<Envelope<Value>> {
        decode(self.client.delete(&format!("/classes/delete-class/{id}")).await?)
    }

    pub async fn add_student(&self, class_id: &str, student_id: &str) -> Result<Envelope<Value>> {
        let body = serde_json::json!({ "studentId": student_id });
        decode(
            self.client
                .post(&format!("/classes/add-student-to-class/{class_id}"), &body)
                .await?,
        )
    }
}

pub struct SubjectsApi {
    client: Arc<ApiClient>,
}

impl SubjectsApi {
    pub async fn get_all(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/subjects/get-all-subjects").await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .get(&format!("/subjects/get-subject-by-id/{id}"))
                .await?,
        )
    }

    pub async fn create(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/subjects/create-subject", body).await?)
    }

    pub async fn update(&self, id: &str, body: &Value) -> Result<Envelope<Value>> {
        decode(
            self.client
                .put(&format!("/subjects/update-subject-by-id/{id}"), body)
                .await?,
        )
    }

    pub async fn delete(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .delete(&format!("/subjects/delete-subject-by-id/{id}"))
                .await?,
        )
    }

    pub async fn assign_teacher(&self, subject_id: &str, teacher_id: &str) -> Result<Envelope<Value>> {
        let body = serde_json::json!({ "teacherId": teacher_id });
        decode(
            self.client
                .post(
                    &format!("/subjects/assign-teacher-to-subject/{subject_id}"),
                    &body,
                )
                .await?,
        )
    }
}

pub struct FeesApi {
    client: Arc<ApiClient>,
}

impl FeesApi {
    pub async fn create_structure(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/fees/create-fee-structure", body).await?)
    }

    pub async fn structures(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/fees/get-fee-structures").await?)
    }

    pub async fn update_structure(&self, id: &str, body: &Value) -> Result<Envelope<Value>> {
        decode(
            self.client
                .put(&format!("/fees/update-fee-structure/{id}"), body)
                .await?,
        )
    }

    pub async fn delete_structure(&self, id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .delete(&format!("/fees/delete-fee-structure/{id}"))
                .await?,
        )
    }

    pub async fn record_payment(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/fees/record-payment", body).await?)
    }

    pub async fn payment_history(&self, student_id: &str) -> Result<Envelope<Value>> {
        decode(
            self.client
                .get(&format!("/fees/get-payment-history/{student_id}"))
                .await?,
        )
    }

    pub async fn report(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/fees/generate-fee-report").await?)
    }
}

/// Feature administration, used by the per-school feature management
/// screen rather than the dashboard shell.
pub struct FeaturesApi {
    client: Arc<ApiClient>,
}

impl FeaturesApi {
    pub async fn all(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/features/features").await?)
    }

    pub async fn check(&self, feature_id: &str) -> Result<Envelope<Value>> {
        decode(self.client.get(&format!("/features/check/{feature_id}")).await?)
    }

    pub async fn school_features(&self, school_id: &str) -> Result<Envelope<Value>> {
        decode(self.client.get(&format!("/features/school/{school_id}")).await?)
    }

    pub async fn update_school_features(
        &self,
        school_id: &str,
        enabled_features: &[String],
    ) -> Result<Envelope<Value>> {
        let body = serde_json::json!({ "enabledFeatures": enabled_features });
        decode(
            self.client
                .put(&format!("/features/school/{school_id}"), &body)
                .await?,
        )
    }

    pub async fn all_schools(&self) -> Result<Envelope<Value>> {
        decode(self.client.get("/features/schools/all").await?)
    }

    pub async fn reload_config(&self) -> Result<Envelope<Value>> {
        decode(self.client.post_empty("/features/reload-config").await?)
    }
}

pub struct ProfileApi {
    client: Arc<ApiClient>,
}

impl ProfileApi {
    pub async fn get(&self) -> Result<Envelope<UserProfile>> {
        decode(self.client.get("/auth/get-user-profile").await?)
    }

    pub async fn update(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.put("/profile", body).await?)
    }

    pub async fn change_password(&self, body: &Value) -> Result<Envelope<Value>> {
        decode(self.client.post("/profile/change-password", body).await?)
    }

    /// Avatar upload; multipart, so the gateway leaves the content type
    /// to the transport.
    pub async fn upload_avatar(&self, form: reqwest::multipart::Form) -> Result<Envelope<Value>> {
        decode(self.client.post_multipart("/profile/avatar", form).await?)
    }
}

pub struct SystemApi {
    client: Arc<ApiClient>,
}

impl SystemApi {
    pub async fn health(&self) -> Result<Value> {
        self.client.get("/health").await
    }
}
