use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::AppointmentError;

pub const APPOINTMENT_CREATED: &str = "appointment_created";

/// Outbound notification dispatch. Callers treat failures as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &str, payload: Value) -> Result<(), AppointmentError>;
}

/// Invokes the configured Edge Function, which emails the professional.
pub struct SupabaseFunctionNotifier {
    supabase: SupabaseClient,
    function: String,
}

impl SupabaseFunctionNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            function: config.notify_function.clone(),
        }
    }
}

#[async_trait]
impl Notifier for SupabaseFunctionNotifier {
    async fn notify(&self, event: &str, payload: Value) -> Result<(), AppointmentError> {
        let mut body = payload;
        if let Value::Object(map) = &mut body {
            map.insert("event".to_string(), json!(event));
        }

        self.supabase
            .invoke_function(&self.function, body)
            .await
            .map_err(|e| AppointmentError::ExternalCollaboratorFailure(e.to_string()))?;

        info!("Dispatched {} via {}", event, self.function);
        Ok(())
    }
}

/// Writes events to the log only. Used when no notification backend is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &str, payload: Value) -> Result<(), AppointmentError> {
        info!(event, %payload, "Notification");
        Ok(())
    }
}
