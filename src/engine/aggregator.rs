use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::engine::badge::{StatusBadge, status_badge};
use crate::engine::pending::{ViewerRole, requires_action};
use crate::models::appointment::{APPOINTMENTS, Appointment, AppointmentStatus};
use crate::models::offer::{OFFERS, Offer};
use crate::observability::metrics::Metrics;
use crate::store::{Document, DocumentStore, MAX_IN_VALUES, Query, StoreError};

/// An offer as seen by one viewer, joined with its appointment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedOffer {
    #[serde(flatten)]
    pub offer: Offer,
    pub is_client: bool,
    pub appointment: Option<Appointment>,
    pub badge: StatusBadge,
}

impl EnrichedOffer {
    pub fn role(&self) -> ViewerRole {
        if self.is_client {
            ViewerRole::Requester
        } else {
            ViewerRole::Provider
        }
    }

    pub fn requires_action(&self) -> bool {
        requires_action(
            self.role(),
            self.offer.status,
            self.appointment.as_ref().map(|a| a.status),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub offers: Vec<EnrichedOffer>,
    pub pending_actions: usize,
}

/// Joins offers with their appointments for `user_id` and counts the
/// pending actions. Newest offers come first.
pub fn summarize_offers(
    user_id: &str,
    offers: Vec<Offer>,
    appointments: &[Appointment],
) -> StatusSummary {
    let mut enriched: Vec<EnrichedOffer> = offers
        .into_iter()
        .map(|offer| {
            let role = ViewerRole::for_offer(&offer, user_id);
            // A cancelled appointment can be followed by a new one; the live
            // one wins.
            let appointment = appointments
                .iter()
                .filter(|appointment| appointment.offer_id == offer.id)
                .min_by_key(|appointment| appointment.status == AppointmentStatus::Cancelled)
                .cloned();
            let badge = status_badge(
                offer.status,
                appointment.as_ref().map(|a| a.status),
                role,
            );

            EnrichedOffer {
                offer,
                is_client: role.is_client(),
                appointment,
                badge,
            }
        })
        .collect();

    enriched.sort_by(|a, b| {
        b.offer
            .created_at
            .cmp(&a.offer.created_at)
            .then_with(|| a.offer.id.cmp(&b.offer.id))
    });

    let pending_actions = enriched.iter().filter(|o| o.requires_action()).count();

    StatusSummary {
        offers: enriched,
        pending_actions,
    }
}

/// Builds one `IN` query per chunk of at most `chunk_size` offer ids.
pub fn appointment_queries(offer_ids: &[String], chunk_size: usize) -> Vec<Query> {
    let chunk_size = chunk_size.clamp(1, MAX_IN_VALUES);
    offer_ids
        .chunks(chunk_size)
        .map(|chunk| Query::collection(APPOINTMENTS).where_in("offerId", chunk.iter().cloned()))
        .collect()
}

/// Read-only view over offers and appointments for a single user.
///
/// Every fetch failure is logged and treated as an empty result: the
/// summary powers a notification badge, so a degraded count is preferred
/// over an error.
#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<dyn DocumentStore>,
    metrics: Metrics,
    in_query_limit: usize,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Metrics) -> Self {
        Self {
            store,
            metrics,
            in_query_limit: MAX_IN_VALUES,
        }
    }

    pub fn with_in_query_limit(mut self, limit: usize) -> Self {
        self.in_query_limit = limit.clamp(1, MAX_IN_VALUES);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn summarize(&self, user_id: Option<&str>) -> StatusSummary {
        let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
            self.metrics
                .aggregations_total
                .with_label_values(&["anonymous"])
                .inc();
            return StatusSummary::default();
        };

        let start = Instant::now();

        let offers = match self.fetch_offers(user_id).await {
            Ok(offers) => offers,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "offer fetch failed; reporting no offers");
                self.metrics
                    .store_fetch_failures_total
                    .with_label_values(&[OFFERS])
                    .inc();
                self.record(start, "degraded");
                return StatusSummary::default();
            }
        };

        let offer_ids: Vec<String> = offers.iter().map(|offer| offer.id.clone()).collect();
        let (appointments, complete) = self.fetch_appointments(&offer_ids).await;

        let summary = summarize_offers(user_id, offers, &appointments);
        self.record(start, if complete { "complete" } else { "degraded" });

        debug!(
            user_id = %user_id,
            offers = summary.offers.len(),
            appointments = appointments.len(),
            pending_actions = summary.pending_actions,
            "status summary computed"
        );

        summary
    }

    pub async fn pending_actions(&self, user_id: Option<&str>) -> usize {
        self.summarize(user_id).await.pending_actions
    }

    /// Offers where the user is requester or provider. The store has no OR,
    /// so both sides are queried concurrently and merged by id.
    async fn fetch_offers(&self, user_id: &str) -> Result<Vec<Offer>, StoreError> {
        let as_requester = Query::collection(OFFERS).where_eq("authorId", user_id);
        let as_provider = Query::collection(OFFERS).where_eq("userId", user_id);

        let (requested, provided) = tokio::join!(
            self.store.fetch(&as_requester),
            self.store.fetch(&as_provider)
        );

        let mut merged: HashMap<String, Offer> = HashMap::new();
        for document in requested?.into_iter().chain(provided?) {
            if merged.contains_key(&document.id) {
                continue;
            }
            if let Some(offer) = decode_or_skip::<Offer>(&document, OFFERS) {
                merged.insert(document.id, offer);
            }
        }

        Ok(merged.into_values().collect())
    }

    /// Returns the appointments found and whether every chunk succeeded.
    async fn fetch_appointments(&self, offer_ids: &[String]) -> (Vec<Appointment>, bool) {
        let queries = appointment_queries(offer_ids, self.in_query_limit);
        let results = join_all(queries.iter().map(|query| self.store.fetch(query))).await;

        let mut appointments = Vec::new();
        let mut complete = true;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(documents) => appointments.extend(
                    documents
                        .iter()
                        .filter_map(|document| decode_or_skip::<Appointment>(document, APPOINTMENTS)),
                ),
                Err(err) => {
                    complete = false;
                    warn!(chunk = index, error = %err, "appointment chunk fetch failed; treating as empty");
                    self.metrics
                        .store_fetch_failures_total
                        .with_label_values(&[APPOINTMENTS])
                        .inc();
                }
            }
        }

        (appointments, complete)
    }

    fn record(&self, start: Instant, outcome: &str) {
        self.metrics
            .aggregation_latency_seconds
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .aggregations_total
            .with_label_values(&[outcome])
            .inc();
    }
}

fn decode_or_skip<T: DeserializeOwned>(document: &Document, collection: &str) -> Option<T> {
    match document.decode::<T>(collection) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(error = %err, "skipping malformed document");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{appointment_queries, summarize_offers};
    use crate::models::appointment::{Appointment, AppointmentStatus};
    use crate::models::offer::{Offer, OfferStatus};
    use crate::store::Filter;

    fn offer(id: &str, author: &str, provider: &str, status: OfferStatus, age_minutes: i64) -> Offer {
        Offer {
            id: id.to_string(),
            project_id: format!("project-{id}"),
            author_id: author.to_string(),
            user_id: provider.to_string(),
            price: 45.0,
            message: "Je peux faire l'ourlet cette semaine".to_string(),
            status,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
                - Duration::minutes(age_minutes),
        }
    }

    fn appointment(offer: &Offer, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: format!("rdv-{}", offer.id),
            offer_id: offer.id.clone(),
            date: Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap(),
            status,
            client_id: offer.author_id.clone(),
            couturier_id: offer.user_id.clone(),
        }
    }

    #[test]
    fn is_client_is_decided_per_offer() {
        let offers = vec![
            offer("o1", "me", "tailor", OfferStatus::Pending, 1),
            offer("o2", "client", "me", OfferStatus::Pending, 2),
        ];

        let summary = summarize_offers("me", offers, &[]);

        assert!(summary.offers[0].is_client);
        assert!(!summary.offers[1].is_client);
        assert_eq!(summary.pending_actions, 2);
    }

    #[test]
    fn refused_offer_contributes_nothing_even_with_appointment() {
        let refused = offer("o1", "client", "me", OfferStatus::Refused, 1);
        let stale = appointment(&refused, AppointmentStatus::Pending);

        let summary = summarize_offers("me", vec![refused], &[stale]);

        assert_eq!(summary.pending_actions, 0);
        assert!(summary.offers[0].appointment.is_some());
    }

    #[test]
    fn confirmed_offer_without_appointment_is_not_pending_for_provider() {
        let confirmed = offer("o1", "client", "me", OfferStatus::Confirmed, 1);

        let summary = summarize_offers("me", vec![confirmed], &[]);

        assert_eq!(summary.pending_actions, 0);
        assert!(summary.offers[0].appointment.is_none());
    }

    #[test]
    fn appointments_join_by_offer_id_regardless_of_order() {
        let a = offer("a", "me", "t1", OfferStatus::Confirmed, 1);
        let b = offer("b", "me", "t2", OfferStatus::Confirmed, 2);
        let appointments = vec![
            appointment(&b, AppointmentStatus::InProgress),
            appointment(&a, AppointmentStatus::WaitPayment),
        ];

        let summary = summarize_offers("me", vec![b, a], &appointments);

        assert_eq!(summary.offers[0].offer.id, "a");
        assert_eq!(
            summary.offers[0].appointment.as_ref().map(|x| x.status),
            Some(AppointmentStatus::WaitPayment)
        );
        assert_eq!(summary.pending_actions, 1);
    }

    #[test]
    fn live_appointment_is_preferred_over_a_cancelled_one() {
        let confirmed = offer("o1", "client", "me", OfferStatus::Confirmed, 1);
        let mut cancelled = appointment(&confirmed, AppointmentStatus::Cancelled);
        cancelled.id = "o1-1".to_string();
        let mut rescheduled = appointment(&confirmed, AppointmentStatus::Pending);
        rescheduled.id = "o1-2".to_string();

        let summary = summarize_offers("me", vec![confirmed], &[cancelled, rescheduled]);

        let joined = summary.offers[0].appointment.as_ref().unwrap();
        assert_eq!(joined.id, "o1-2");
        assert!(summary.offers[0].badge.action_required);
        assert_eq!(summary.pending_actions, 1);
    }

    #[test]
    fn offers_are_sorted_newest_first() {
        let offers = vec![
            offer("old", "me", "t", OfferStatus::Refused, 30),
            offer("new", "me", "t", OfferStatus::Refused, 1),
        ];

        let summary = summarize_offers("me", offers, &[]);

        let ids: Vec<_> = summary.offers.iter().map(|o| o.offer.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn twenty_three_ids_make_three_chunks() {
        let ids: Vec<String> = (0..23).map(|i| format!("offer-{i}")).collect();

        let queries = appointment_queries(&ids, 10);

        let sizes: Vec<usize> = queries
            .iter()
            .map(|query| match &query.filters[0] {
                Filter::In { values, .. } => values.len(),
                other => panic!("unexpected filter {other:?}"),
            })
            .collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[test]
    fn no_ids_means_no_queries() {
        assert!(appointment_queries(&[], 10).is_empty());
    }
}
