use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::error::AppError;
use crate::models::appointment::{APPOINTMENTS, Appointment, AppointmentStatus};
use crate::models::offer::{OFFERS, Offer, OfferStatus};
use crate::store::{Document, DocumentStore, Fields, Query};

#[derive(Debug, Clone)]
pub struct NewOffer {
    pub project_id: String,
    pub requester_id: String,
    pub provider_id: String,
    pub price: f64,
    pub message: String,
}

pub async fn load_offer(store: &dyn DocumentStore, id: &str) -> Result<Offer, AppError> {
    let document = store
        .get(OFFERS, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("offer {id} not found")))?;
    Ok(document.decode(OFFERS)?)
}

pub async fn load_appointment(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<Appointment, AppError> {
    let document = store
        .get(APPOINTMENTS, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id} not found")))?;
    Ok(document.decode(APPOINTMENTS)?)
}

/// A provider bids on a requester's project.
pub async fn submit_offer(store: &dyn DocumentStore, new: NewOffer) -> Result<Offer, AppError> {
    if new.project_id.trim().is_empty() {
        return Err(AppError::BadRequest("projectId cannot be empty".to_string()));
    }
    if new.requester_id.trim().is_empty() || new.provider_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "authorId and userId are required".to_string(),
        ));
    }
    if new.requester_id == new.provider_id {
        return Err(AppError::BadRequest(
            "a user cannot bid on their own project".to_string(),
        ));
    }
    if !new.price.is_finite() || new.price <= 0.0 {
        return Err(AppError::BadRequest("price must be > 0".to_string()));
    }

    let mut offer = Offer {
        id: String::new(),
        project_id: new.project_id,
        author_id: new.requester_id,
        user_id: new.provider_id,
        price: new.price,
        message: new.message,
        status: OfferStatus::Pending,
        created_at: Utc::now(),
    };

    let stored = store
        .insert(OFFERS, Document::from_record("", &offer)?.fields)
        .await?;
    offer.id = stored.id;

    info!(
        offer_id = %offer.id,
        requester_id = %offer.author_id,
        provider_id = %offer.user_id,
        "offer submitted"
    );
    Ok(offer)
}

/// Accepts or refuses a pending offer on behalf of either party.
pub async fn respond_to_offer(
    store: &dyn DocumentStore,
    offer_id: &str,
    actor_id: &str,
    next: OfferStatus,
) -> Result<Offer, AppError> {
    let offer = load_offer(store, offer_id).await?;
    ensure_party(&offer, actor_id)?;

    if !offer.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition {
            from: offer.status.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    let updated = store
        .update_if(
            OFFERS,
            offer_id,
            "status",
            &Value::String(offer.status.as_str().to_string()),
            status_fields(next.as_str()),
        )
        .await?;

    info!(offer_id = %offer_id, actor_id = %actor_id, status = next.as_str(), "offer answered");
    Ok(updated.decode(OFFERS)?)
}

/// Creates the live appointment of a confirmed offer. A cancelled
/// appointment may be followed by a new proposal.
///
/// Appointment ids are `{offer_id}-{n}` where `n` counts the offer's
/// appointments, so two concurrent proposals collide on the same id and
/// only one is stored.
pub async fn propose_appointment(
    store: &dyn DocumentStore,
    offer_id: &str,
    actor_id: &str,
    date: DateTime<Utc>,
) -> Result<Appointment, AppError> {
    let offer = load_offer(store, offer_id).await?;
    ensure_party(&offer, actor_id)?;

    if offer.status != OfferStatus::Confirmed {
        return Err(AppError::Conflict(format!(
            "offer {offer_id} is {}, appointments need a confirmed offer",
            offer.status.as_str()
        )));
    }

    let existing: Vec<Appointment> = store
        .fetch(&Query::collection(APPOINTMENTS).where_eq("offerId", offer_id))
        .await?
        .iter()
        .map(|document| document.decode(APPOINTMENTS))
        .collect::<Result<_, _>>()?;
    if existing
        .iter()
        .any(|appointment| appointment.status != AppointmentStatus::Cancelled)
    {
        return Err(AppError::Conflict(format!(
            "offer {offer_id} already has an appointment"
        )));
    }

    let appointment = Appointment {
        id: format!("{offer_id}-{}", existing.len() + 1),
        offer_id: offer.id.clone(),
        date,
        status: AppointmentStatus::Pending,
        client_id: offer.author_id.clone(),
        couturier_id: offer.user_id.clone(),
    };

    store
        .create(
            APPOINTMENTS,
            Document::from_record(appointment.id.clone(), &appointment)?,
        )
        .await?;

    info!(
        appointment_id = %appointment.id,
        offer_id = %offer_id,
        actor_id = %actor_id,
        "appointment proposed"
    );
    Ok(appointment)
}

pub async fn advance_appointment(
    store: &dyn DocumentStore,
    appointment_id: &str,
    actor_id: &str,
    next: AppointmentStatus,
) -> Result<Appointment, AppError> {
    let appointment = load_appointment(store, appointment_id).await?;
    if appointment.client_id != actor_id && appointment.couturier_id != actor_id {
        return Err(AppError::Forbidden(format!(
            "{actor_id} is not a party to appointment {appointment_id}"
        )));
    }

    if !appointment.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition {
            from: appointment.status.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    let updated = store
        .update_if(
            APPOINTMENTS,
            appointment_id,
            "status",
            &Value::String(appointment.status.as_str().to_string()),
            status_fields(next.as_str()),
        )
        .await?;

    info!(
        appointment_id = %appointment_id,
        actor_id = %actor_id,
        status = next.as_str(),
        "appointment advanced"
    );
    Ok(updated.decode(APPOINTMENTS)?)
}

fn ensure_party(offer: &Offer, actor_id: &str) -> Result<(), AppError> {
    if offer.is_party(actor_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{actor_id} is not a party to offer {}",
            offer.id
        )))
    }
}

fn status_fields(status: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("status".to_string(), Value::String(status.to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::store::InMemoryStore;

    fn bid(requester: &str, provider: &str) -> NewOffer {
        NewOffer {
            project_id: "robe-de-mariee".to_string(),
            requester_id: requester.to_string(),
            provider_id: provider.to_string(),
            price: 120.0,
            message: "Retouches comprises".to_string(),
        }
    }

    #[tokio::test]
    async fn full_lifecycle_to_payment() {
        let store = InMemoryStore::default();

        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);

        let offer = respond_to_offer(&store, &offer.id, "client", OfferStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(offer.status, OfferStatus::Confirmed);

        let appointment = propose_appointment(&store, &offer.id, "client", Utc::now())
            .await
            .unwrap();
        assert_eq!(appointment.client_id, "client");
        assert_eq!(appointment.couturier_id, "tailor");

        for next in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::WaitPayment,
            AppointmentStatus::PaymentConfirmed,
        ] {
            let updated = advance_appointment(&store, &appointment.id, "tailor", next)
                .await
                .unwrap();
            assert_eq!(updated.status, next);
        }
    }

    #[tokio::test]
    async fn self_bid_is_rejected() {
        let store = InMemoryStore::default();
        let result = submit_offer(&store, bid("same", "same")).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn answered_offer_cannot_be_answered_again() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();
        respond_to_offer(&store, &offer.id, "client", OfferStatus::Refused)
            .await
            .unwrap();

        let again = respond_to_offer(&store, &offer.id, "client", OfferStatus::Confirmed).await;
        assert!(matches!(again, Err(AppError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn outsiders_cannot_write() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();

        let result = respond_to_offer(&store, &offer.id, "stranger", OfferStatus::Confirmed).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn appointment_requires_confirmed_offer_and_is_unique() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();

        let early = propose_appointment(&store, &offer.id, "client", Utc::now()).await;
        assert!(matches!(early, Err(AppError::Conflict(_))));

        respond_to_offer(&store, &offer.id, "tailor", OfferStatus::Confirmed)
            .await
            .unwrap();
        propose_appointment(&store, &offer.id, "client", Utc::now())
            .await
            .unwrap();

        let second = propose_appointment(&store, &offer.id, "tailor", Utc::now()).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn cancelled_appointment_can_be_replaced() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();
        respond_to_offer(&store, &offer.id, "client", OfferStatus::Confirmed)
            .await
            .unwrap();
        let first = propose_appointment(&store, &offer.id, "client", Utc::now())
            .await
            .unwrap();
        advance_appointment(&store, &first.id, "tailor", AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let second = propose_appointment(&store, &offer.id, "client", Utc::now())
            .await
            .unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(second.status, AppointmentStatus::Pending);

        let third = propose_appointment(&store, &offer.id, "tailor", Utc::now()).await;
        assert!(matches!(third, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn proposal_colliding_with_a_concurrent_one_is_rejected() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();
        respond_to_offer(&store, &offer.id, "client", OfferStatus::Confirmed)
            .await
            .unwrap();

        // A rival proposal already holds the next id but is not yet visible
        // to the offerId query.
        let rival = Document::new(format!("{}-1", offer.id), Fields::new());
        store.create(APPOINTMENTS, rival).await.unwrap();

        let racing = propose_appointment(&store, &offer.id, "tailor", Utc::now()).await;
        assert!(matches!(racing, Err(AppError::Conflict(_))));
        assert_eq!(store.count(APPOINTMENTS), 1);
    }

    #[tokio::test]
    async fn stale_offer_answer_is_rejected_by_the_store() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();

        // Another writer answered between our read and our write.
        store
            .update(OFFERS, &offer.id, status_fields("refused"))
            .await
            .unwrap();
        let stale = store
            .update_if(
                OFFERS,
                &offer.id,
                "status",
                &json!("pending"),
                status_fields("confirmed"),
            )
            .await
            .map_err(AppError::from);
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let current = load_offer(&store, &offer.id).await.unwrap();
        assert_eq!(current.status, OfferStatus::Refused);
    }

    #[tokio::test]
    async fn cancelled_appointment_is_terminal() {
        let store = InMemoryStore::default();
        let offer = submit_offer(&store, bid("client", "tailor")).await.unwrap();
        respond_to_offer(&store, &offer.id, "client", OfferStatus::Confirmed)
            .await
            .unwrap();
        let appointment = propose_appointment(&store, &offer.id, "client", Utc::now())
            .await
            .unwrap();

        advance_appointment(&store, &appointment.id, "client", AppointmentStatus::Cancelled)
            .await
            .unwrap();
        let revived =
            advance_appointment(&store, &appointment.id, "tailor", AppointmentStatus::Confirmed)
                .await;
        assert!(matches!(revived, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn status_fields_hold_only_status() {
        assert_eq!(Value::Object(status_fields("confirmed")), json!({ "status": "confirmed" }));
    }
}
