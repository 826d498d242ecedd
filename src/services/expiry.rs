//! expiry.rs
//!
//! In-process consumer of `ReservationCreated`.
//!
//! For each event it logs the user notification and schedules the hold expiry at
//! `timestamp + hold`. When the hold runs out, an unpaid reservation is released
//! through `TicketingService::expire_reservation`. A paid or already-removed
//! reservation is left alone, so late or repeated timers are harmless.
//! Duplicate deliveries are recognised by `event_id` and dropped.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::ReservationCreated;
use crate::services::ticketing::TicketingService;
use crate::store::TicketStore;

pub struct ReservationEventConsumer<S> {
    service: Arc<TicketingService<S>>,
    hold: Duration,
    /// event_id -> event timestamp, kept for twice the hold.
    seen: HashMap<Uuid, DateTime<Utc>>,
}

impl<S: TicketStore> ReservationEventConsumer<S> {
    pub fn new(service: Arc<TicketingService<S>>, hold: Duration) -> Self {
        Self {
            service,
            hold,
            seen: HashMap::new(),
        }
    }

    /// Runs until every publisher is dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ReservationCreated>) {
        info!("Reservation event consumer started (hold {:?})", self.hold);
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        info!("Reservation event channel closed, consumer stopped");
    }

    /// Returns the expiry task, or `None` for a duplicate delivery.
    pub fn handle(&mut self, event: ReservationCreated) -> Option<JoinHandle<()>> {
        self.forget_old_events();
        if self.seen.insert(event.event_id, event.timestamp).is_some() {
            debug!("Duplicate event {} for reservation {}", event.event_id, event.reservation_id);
            return None;
        }

        info!(
            "Notifying user {}: seat {} is held by reservation {}",
            event.user_id, event.seat_id, event.reservation_id
        );

        let service = self.service.clone();
        let wait = remaining_hold(event.timestamp, self.hold);
        let reservation_id = event.reservation_id;
        Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Err(e) = service.expire_reservation(reservation_id).await {
                error!("Expiry of reservation {} failed: {:?}", reservation_id, e);
            }
        }))
    }

    fn forget_old_events(&mut self) {
        let horizon = TimeDelta::from_std(self.hold * 2)
            .ok()
            .and_then(|keep| Utc::now().checked_sub_signed(keep));
        if let Some(horizon) = horizon {
            self.seen.retain(|_, timestamp| *timestamp > horizon);
        }
    }
}

fn remaining_hold(created_at: DateTime<Utc>, hold: Duration) -> Duration {
    let elapsed = (Utc::now() - created_at).to_std().unwrap_or_default();
    hold.saturating_sub(elapsed)
}
