use serde::Serialize;

use crate::models::appointment::AppointmentStatus;
use crate::models::offer::{Offer, OfferStatus};

/// Which side of a particular offer the viewer is on. A user can be the
/// requester on one offer and the provider on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewerRole {
    Requester,
    Provider,
}

impl ViewerRole {
    pub fn for_offer(offer: &Offer, user_id: &str) -> Self {
        if offer.author_id == user_id {
            ViewerRole::Requester
        } else {
            ViewerRole::Provider
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, ViewerRole::Requester)
    }
}

/// Whether an offer/appointment pair is waiting on the viewer.
///
/// Pending offers need an answer from both sides. Once confirmed, the
/// requester acts when payment is requested and the provider acts when an
/// appointment has been proposed. Refused offers never count.
pub fn requires_action(
    role: ViewerRole,
    offer_status: OfferStatus,
    appointment_status: Option<AppointmentStatus>,
) -> bool {
    match (offer_status, role, appointment_status) {
        (OfferStatus::Pending, _, _) => true,
        (OfferStatus::Confirmed, ViewerRole::Requester, Some(AppointmentStatus::WaitPayment)) => {
            true
        }
        (OfferStatus::Confirmed, ViewerRole::Provider, Some(AppointmentStatus::Pending)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewerRole, requires_action};
    use crate::models::appointment::AppointmentStatus;
    use crate::models::offer::OfferStatus;

    const ALL_APPOINTMENT_STATES: [Option<AppointmentStatus>; 7] = [
        None,
        Some(AppointmentStatus::Pending),
        Some(AppointmentStatus::Confirmed),
        Some(AppointmentStatus::InProgress),
        Some(AppointmentStatus::WaitPayment),
        Some(AppointmentStatus::PaymentConfirmed),
        Some(AppointmentStatus::Cancelled),
    ];

    #[test]
    fn refused_offers_never_count() {
        for role in [ViewerRole::Requester, ViewerRole::Provider] {
            for appointment in ALL_APPOINTMENT_STATES {
                assert!(!requires_action(role, OfferStatus::Refused, appointment));
            }
        }
    }

    #[test]
    fn pending_offers_count_for_both_sides() {
        assert!(requires_action(ViewerRole::Requester, OfferStatus::Pending, None));
        assert!(requires_action(ViewerRole::Provider, OfferStatus::Pending, None));
    }

    #[test]
    fn requester_acts_only_on_payment_request() {
        let counted: Vec<_> = ALL_APPOINTMENT_STATES
            .into_iter()
            .filter(|appointment| {
                requires_action(ViewerRole::Requester, OfferStatus::Confirmed, *appointment)
            })
            .collect();
        assert_eq!(counted, vec![Some(AppointmentStatus::WaitPayment)]);
    }

    #[test]
    fn provider_acts_only_on_proposed_appointment() {
        let counted: Vec<_> = ALL_APPOINTMENT_STATES
            .into_iter()
            .filter(|appointment| {
                requires_action(ViewerRole::Provider, OfferStatus::Confirmed, *appointment)
            })
            .collect();
        assert_eq!(counted, vec![Some(AppointmentStatus::Pending)]);
    }

    #[test]
    fn confirmed_offer_without_appointment_is_quiet_for_provider() {
        assert!(!requires_action(ViewerRole::Provider, OfferStatus::Confirmed, None));
    }
}
