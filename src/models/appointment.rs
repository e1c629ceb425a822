use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const APPOINTMENTS: &str = "appointments";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    WaitPayment,
    PaymentConfirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "inProgress",
            AppointmentStatus::WaitPayment => "waitPayment",
            AppointmentStatus::PaymentConfirmed => "paymentConfirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            AppointmentStatus::Pending => 0,
            AppointmentStatus::Confirmed => 1,
            AppointmentStatus::InProgress => 2,
            AppointmentStatus::WaitPayment => 3,
            AppointmentStatus::PaymentConfirmed => 4,
            AppointmentStatus::Cancelled => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::PaymentConfirmed | AppointmentStatus::Cancelled
        )
    }

    /// Status only moves forward; any live appointment may be cancelled.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == AppointmentStatus::Cancelled {
            return true;
        }
        next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(default)]
    pub id: String,
    pub offer_id: String,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub client_id: String,
    pub couturier_id: String,
}
