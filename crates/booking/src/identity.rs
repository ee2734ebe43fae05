//! Role lookup and provider service registration.

use careescrow_storage::{BookingStore, NewService, NewUser, Role, ServiceRecord, ServiceType};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::BookingError;
use crate::orchestrator::{required, BookingLifecycle};

/// Input of [`BookingLifecycle::register_service`].
#[derive(Debug, Clone, Default)]
pub struct RegisterServiceRequest {
    pub provider_id: String,
    pub email: Option<String>,
    pub name: String,
    /// `Nurse`, `Driver` or `House Help`.
    pub service_type: String,
    pub hourly_rate: Decimal,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub availability: Option<serde_json::Value>,
}

impl<S: BookingStore> BookingLifecycle<S> {
    pub async fn resolve_role(&self, user_id: &str) -> Result<Role, BookingError> {
        let user_id = required("userId", user_id)?;
        Ok(self.store().get_user(user_id).await?.role)
    }

    /// Create a service, provisioning its provider as a `provider` user.
    pub async fn register_service(
        &self,
        request: RegisterServiceRequest,
    ) -> Result<ServiceRecord, BookingError> {
        let provider_id = required("provider_id", &request.provider_id)?;
        let name = required("name", &request.name)?;
        let service_type: ServiceType = required("type", &request.service_type)?
            .parse()
            .map_err(BookingError::Validation)?;
        if request.hourly_rate <= Decimal::ZERO {
            return Err(BookingError::Validation(
                "hourly_rate must be positive".to_string(),
            ));
        }

        self.provision(NewUser {
            id: provider_id.to_string(),
            email: request.email.clone(),
            name: None,
            role: Role::Provider,
        })
        .await?;

        let service = self
            .store()
            .insert_service(NewService {
                provider_id: provider_id.to_string(),
                service_type,
                name: name.to_string(),
                description: request.description.filter(|d| !d.is_empty()),
                hourly_rate: request.hourly_rate,
                availability: request.availability,
                image_url: request.image_url.filter(|u| !u.is_empty()),
            })
            .await?;
        info!(
            service_id = %service.id,
            provider_id,
            service_type = service_type.as_str(),
            "service registered"
        );
        Ok(service)
    }
}
