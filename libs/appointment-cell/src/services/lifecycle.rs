// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, ChargeOutcome, ChargeRequest,
    PaymentOrder, PaymentStatus,
};
use crate::services::payment::PaymentGateway;
use crate::services::repository::{validate_range, AppointmentRepository};
use crate::services::slots::SlotResolver;

/// Enforces the `(status, payment_status)` state machine:
///
/// ```text
/// (pending, unpaid)  --accept-->     (accepted, unpaid)
/// (pending, unpaid)  --reject-->     (rejected, unpaid)          terminal
/// (pending, unpaid)  --reschedule--> (pending, unpaid)
/// (pending, unpaid)  --cancel-->     (cancelled, cancelled)      terminal
/// (accepted, unpaid) --pay-->        (accepted, paid)
/// (accepted, unpaid) --reschedule--> (accepted, unpaid)
/// (accepted, unpaid) --cancel-->     (cancelled, cancelled)      terminal
/// (accepted, paid)   --cancel-->     (cancelled, refund_initiated) terminal
/// ```
///
/// Callers are expected to have authorized the actor already.
pub struct AppointmentLifecycle {
    repository: Arc<AppointmentRepository>,
    resolver: Arc<SlotResolver>,
    payments: Arc<dyn PaymentGateway>,
    fee: i64,
    currency: String,
}

impl AppointmentLifecycle {
    pub fn new(
        repository: Arc<AppointmentRepository>,
        resolver: Arc<SlotResolver>,
        payments: Arc<dyn PaymentGateway>,
        fee: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            resolver,
            payments,
            fee,
            currency: currency.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn accept(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.repository.get(id).await?;
        require_status(&current, AppointmentStatus::Pending, "accept")?;

        let updated = self
            .repository
            .update_status(id, current.version, AppointmentStatus::Accepted)
            .await?;
        info!("Appointment {} accepted", id);
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.repository.get(id).await?;
        require_status(&current, AppointmentStatus::Pending, "reject")?;

        let updated = self
            .repository
            .update_status(id, current.version, AppointmentStatus::Rejected)
            .await?;
        info!("Appointment {} rejected", id);
        Ok(updated)
    }

    /// Moves the appointment to a new interval, keeping its status. The new
    /// interval must be free, ignoring the appointment's own hold.
    #[instrument(skip(self))]
    pub async fn reschedule(
        &self,
        id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.repository.get(id).await?;
        ensure_not_terminal(&current, "reschedule")?;
        if current.payment_status == PaymentStatus::Paid {
            warn!("Refusing to reschedule paid appointment {}", id);
            return Err(AppointmentError::EditNotAllowed);
        }
        validate_range(from, to)?;

        self.resolver
            .ensure_bookable(current.professional_id, from, to, Some(id))
            .await?;

        let updated = self
            .repository
            .update_times(id, current.version, from, to)
            .await?;
        info!("Appointment {} moved to {} - {}", id, from, to);
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.repository.get(id).await?;
        ensure_not_terminal(&current, "cancel")?;

        let payment_status = match current.payment_status {
            PaymentStatus::Paid => PaymentStatus::RefundInitiated,
            _ => PaymentStatus::Cancelled,
        };

        let updated = self
            .repository
            .update_state(id, current.version, AppointmentStatus::Cancelled, payment_status)
            .await?;
        info!("Appointment {} cancelled with payment {}", id, payment_status);
        Ok(updated)
    }

    /// Opens a gateway order for the consultation fee.
    #[instrument(skip(self))]
    pub async fn create_payment_order(&self, id: Uuid) -> Result<PaymentOrder, AppointmentError> {
        let current = self.repository.get(id).await?;
        require_payable(&current, "pay")?;

        let order = self
            .payments
            .create_order(self.fee, &self.currency, &id.to_string())
            .await?;
        self.repository
            .record_payment_order(id, current.version, order.id.clone())
            .await?;

        info!("Payment order {} opened for appointment {}", order.id, id);
        Ok(order)
    }

    /// Flips payment to `paid` only when the gateway confirms the charge
    /// against the order opened for this appointment.
    #[instrument(skip(self, request))]
    pub async fn pay(&self, id: Uuid, request: &ChargeRequest) -> Result<Appointment, AppointmentError> {
        let current = self.repository.get(id).await?;
        require_payable(&current, "pay")?;

        match &current.payment_order_id {
            Some(order_id) if *order_id == request.order_id => {}
            Some(_) => {
                warn!("Payment for order {} presented to appointment {}", request.order_id, id);
                return Err(AppointmentError::ValidationError(
                    "payment does not belong to this appointment's order".to_string(),
                ));
            }
            None => {
                warn!("Payment presented to appointment {} before an order was opened", id);
                return Err(AppointmentError::ValidationError(
                    "no payment order has been opened for this appointment".to_string(),
                ));
            }
        }

        match self.payments.charge(request).await? {
            ChargeOutcome::Succeeded { reference } => {
                let updated = self
                    .repository
                    .update_payment_status(id, current.version, PaymentStatus::Paid, Some(reference))
                    .await?;
                info!("Appointment {} paid", id);
                Ok(updated)
            }
            ChargeOutcome::Declined { reason } => {
                warn!("Payment for appointment {} declined: {}", id, reason);
                Err(AppointmentError::PaymentDeclined(reason))
            }
        }
    }
}

fn invalid(current: &Appointment, action: &'static str) -> AppointmentError {
    warn!(
        "Illegal {} on appointment {} in {}/{}",
        action, current.id, current.status, current.payment_status
    );
    AppointmentError::InvalidTransition {
        status: current.status,
        payment_status: current.payment_status,
        action,
    }
}

fn ensure_not_terminal(current: &Appointment, action: &'static str) -> Result<(), AppointmentError> {
    if current.status.is_terminal() {
        return Err(invalid(current, action));
    }
    Ok(())
}

fn require_status(
    current: &Appointment,
    expected: AppointmentStatus,
    action: &'static str,
) -> Result<(), AppointmentError> {
    if current.status != expected {
        return Err(invalid(current, action));
    }
    Ok(())
}

fn require_payable(current: &Appointment, action: &'static str) -> Result<(), AppointmentError> {
    if current.status != AppointmentStatus::Accepted || current.payment_status != PaymentStatus::Unpaid {
        return Err(invalid(current, action));
    }
    Ok(())
}
