use serde::Serialize;

use crate::engine::pending::{ViewerRole, requires_action};
use crate::models::appointment::AppointmentStatus;
use crate::models::offer::OfferStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeTone {
    Action,
    Waiting,
    Success,
    Danger,
}

/// Display copy for an offer row, as seen by one of its two parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBadge {
    pub label: &'static str,
    pub message: &'static str,
    pub tone: BadgeTone,
    pub action_required: bool,
}

pub fn status_badge(
    offer_status: OfferStatus,
    appointment_status: Option<AppointmentStatus>,
    role: ViewerRole,
) -> StatusBadge {
    use AppointmentStatus as A;
    use ViewerRole::{Provider, Requester};

    let (label, message, tone) = match (offer_status, appointment_status, role) {
        // The offer status wins over any appointment left behind.
        (OfferStatus::Refused, _, Requester) => (
            "Offre refusée",
            "Vous avez refusé cette offre.",
            BadgeTone::Danger,
        ),
        (OfferStatus::Refused, _, Provider) => (
            "Offre refusée",
            "Le client a refusé votre offre.",
            BadgeTone::Danger,
        ),
        (OfferStatus::Pending, _, Requester) => (
            "Nouvelle offre",
            "Un couturier vous a fait une offre, acceptez-la ou refusez-la.",
            BadgeTone::Action,
        ),
        (OfferStatus::Pending, _, Provider) => (
            "Offre envoyée",
            "Votre offre attend la réponse du client.",
            BadgeTone::Action,
        ),

        (OfferStatus::Confirmed, None, Requester) => (
            "Offre acceptée",
            "Proposez une date de rendez-vous au couturier.",
            BadgeTone::Waiting,
        ),
        (OfferStatus::Confirmed, None, Provider) => (
            "Offre acceptée",
            "En attente d'une proposition de rendez-vous.",
            BadgeTone::Waiting,
        ),
        (OfferStatus::Confirmed, Some(A::Pending), Requester) => (
            "Rendez-vous proposé",
            "En attente de la confirmation du couturier.",
            BadgeTone::Waiting,
        ),
        (OfferStatus::Confirmed, Some(A::Pending), Provider) => (
            "Rendez-vous à confirmer",
            "Le client propose un rendez-vous, confirmez-le.",
            BadgeTone::Action,
        ),
        (OfferStatus::Confirmed, Some(A::Confirmed), _) => (
            "Rendez-vous confirmé",
            "Le rendez-vous est planifié.",
            BadgeTone::Success,
        ),
        (OfferStatus::Confirmed, Some(A::InProgress), Requester) => (
            "En cours",
            "Le couturier travaille sur votre projet.",
            BadgeTone::Waiting,
        ),
        (OfferStatus::Confirmed, Some(A::InProgress), Provider) => (
            "En cours",
            "Prestation en cours.",
            BadgeTone::Waiting,
        ),
        (OfferStatus::Confirmed, Some(A::WaitPayment), Requester) => (
            "Paiement requis",
            "Réglez la prestation pour la finaliser.",
            BadgeTone::Action,
        ),
        (OfferStatus::Confirmed, Some(A::WaitPayment), Provider) => (
            "En attente de paiement",
            "Le client doit régler la prestation.",
            BadgeTone::Waiting,
        ),
        (OfferStatus::Confirmed, Some(A::PaymentConfirmed), Requester) => (
            "Payé",
            "Paiement confirmé, merci !",
            BadgeTone::Success,
        ),
        (OfferStatus::Confirmed, Some(A::PaymentConfirmed), Provider) => (
            "Paiement reçu",
            "Le paiement du client a été confirmé.",
            BadgeTone::Success,
        ),
        (OfferStatus::Confirmed, Some(A::Cancelled), Requester) => (
            "Rendez-vous annulé",
            "Le rendez-vous avec le couturier a été annulé.",
            BadgeTone::Danger,
        ),
        (OfferStatus::Confirmed, Some(A::Cancelled), Provider) => (
            "Rendez-vous annulé",
            "Le rendez-vous avec le client a été annulé.",
            BadgeTone::Danger,
        ),
    };

    StatusBadge {
        label,
        message,
        tone,
        action_required: requires_action(role, offer_status, appointment_status),
    }
}

#[cfg(test)]
mod tests {
    use super::{BadgeTone, status_badge};
    use crate::engine::pending::ViewerRole;
    use crate::models::appointment::AppointmentStatus;
    use crate::models::offer::OfferStatus;

    #[test]
    fn copy_differs_per_role() {
        let requester = status_badge(
            OfferStatus::Confirmed,
            Some(AppointmentStatus::WaitPayment),
            ViewerRole::Requester,
        );
        let provider = status_badge(
            OfferStatus::Confirmed,
            Some(AppointmentStatus::WaitPayment),
            ViewerRole::Provider,
        );

        assert_ne!(requester.label, provider.label);
        assert!(requester.action_required);
        assert!(!provider.action_required);
    }

    #[test]
    fn refusal_overrides_stale_appointment() {
        let badge = status_badge(
            OfferStatus::Refused,
            Some(AppointmentStatus::Pending),
            ViewerRole::Provider,
        );
        assert_eq!(badge.label, "Offre refusée");
        assert_eq!(badge.tone, BadgeTone::Danger);
        assert!(!badge.action_required);
    }

    #[test]
    fn action_tone_only_when_action_required() {
        let offers = [OfferStatus::Pending, OfferStatus::Confirmed, OfferStatus::Refused];
        let appointments = [
            None,
            Some(AppointmentStatus::Pending),
            Some(AppointmentStatus::Confirmed),
            Some(AppointmentStatus::InProgress),
            Some(AppointmentStatus::WaitPayment),
            Some(AppointmentStatus::PaymentConfirmed),
            Some(AppointmentStatus::Cancelled),
        ];

        for offer in offers {
            for appointment in appointments {
                for role in [ViewerRole::Requester, ViewerRole::Provider] {
                    let badge = status_badge(offer, appointment, role);
                    assert_eq!(
                        badge.tone == BadgeTone::Action,
                        badge.action_required,
                        "{offer:?} {appointment:?} {role:?}"
                    );
                }
            }
        }
    }
}
