use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::domain::models::event::{Assignment, Event, EventStatus, NewEvent, Participant};
use crate::domain::ports::{DocPath, DocumentStore, DocumentWatch, QueryWatch, TxNext};
use crate::domain::services::assignment::generate_assignments;
use crate::error::AppError;

const COLLECTION: &str = "events";

pub struct EventWatch {
    inner: DocumentWatch,
}

impl EventWatch {
    pub async fn next(&mut self) -> Result<Option<Event>, AppError> {
        match self.inner.next().await {
            None => Err(AppError::Store("event subscription closed".to_string())),
            Some(None) => Ok(None),
            Some(Some(value)) => {
                let event = Event::from_value(value)?;
                if event.status == EventStatus::Deleted {
                    Ok(None)
                } else {
                    Ok(Some(event))
                }
            }
        }
    }

    pub fn cancel(self) {}
}

pub struct EventListWatch {
    user_id: String,
    inner: QueryWatch,
}

impl EventListWatch {
    pub async fn next(&mut self) -> Result<Vec<Event>, AppError> {
        let docs = self
            .inner
            .next()
            .await
            .ok_or_else(|| AppError::Store("event subscription closed".to_string()))?;

        let mut events = Vec::new();
        for doc in docs {
            let event = Event::from_value(doc.data)?;
            if event.status != EventStatus::Deleted && event.is_member(&self.user_id) {
                events.push(event);
            }
        }
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    pub fn cancel(self) {}
}

pub struct EventService {
    store: Arc<dyn DocumentStore>,
}

impl EventService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_event(
        &self,
        organizer_id: &str,
        organizer_name: &str,
        data: NewEvent,
    ) -> Result<String, AppError> {
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("event name must not be empty".to_string()));
        }
        if let Some(min) = data.min_participants {
            if min < 2 {
                return Err(AppError::Validation(format!(
                    "minimum participants must be at least 2, got {min}"
                )));
            }
        }

        let event = Event::new(organizer_id, organizer_name, data);
        let path = DocPath::new(COLLECTION, &event.id);
        self.store.set(&path, event.to_value()?).await?;

        info!("Created event {} for organizer {}", event.id, organizer_id);
        Ok(event.id)
    }

    pub async fn watch_event(&self, event_id: &str) -> Result<EventWatch, AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let inner = self.store.watch(&path).await?;
        Ok(EventWatch { inner })
    }

    // Membership is organizer-or-participant, which a field-equality query
    // cannot express, so this watches the collection and filters per emission.
    pub async fn watch_user_events(&self, user_id: &str) -> Result<EventListWatch, AppError> {
        let inner = self.store.watch_query(COLLECTION, &[]).await?;
        Ok(EventListWatch {
            user_id: user_id.to_string(),
            inner,
        })
    }

    // A user already present (by id, or by non-empty email) is not added twice.
    pub async fn add_participant(
        &self,
        event_id: &str,
        user_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let id = event_id.to_string();
        let user_id = user_id.to_string();
        let email = email.to_string();
        let display_name = display_name.to_string();

        self.store
            .transaction(
                &path,
                Box::new(move |current| {
                    let mut event = require_event(&id, current)?;
                    let already_in = event.participants.iter().any(|p| {
                        p.user_id == user_id || (!email.is_empty() && p.email == email)
                    });
                    if already_in {
                        return Ok(TxNext::Unchanged);
                    }
                    event.participants.push(Participant {
                        user_id: user_id.clone(),
                        email: email.clone(),
                        display_name: display_name.clone(),
                        joined_at: Utc::now(),
                    });
                    Ok(TxNext::Write(event.to_value()?))
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_participant(&self, event_id: &str, user_id: &str) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let id = event_id.to_string();
        let user_id = user_id.to_string();

        self.store
            .transaction(
                &path,
                Box::new(move |current| {
                    let mut event = require_event(&id, current)?;
                    let before = event.participants.len();
                    event.participants.retain(|p| p.user_id != user_id);
                    if event.participants.len() == before {
                        return Ok(TxNext::Unchanged);
                    }
                    Ok(TxNext::Write(event.to_value()?))
                }),
            )
            .await?;
        Ok(())
    }

    // Unconditional write; callers own the ordering of transitions.
    pub async fn update_status(&self, event_id: &str, status: EventStatus) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let mut fields = serde_json::Map::new();
        fields.insert("status".to_string(), serde_json::to_value(status)?);
        self.store.update(&path, fields).await
    }

    // The guard and the write commit together; a second drawing attempt
    // fails with InvalidState instead of overwriting the first.
    pub async fn perform_drawing(
        &self,
        event_id: &str,
        assignments: Vec<Assignment>,
    ) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let id = event_id.to_string();
        let count = assignments.len();

        self.store
            .transaction(
                &path,
                Box::new(move |current| {
                    let mut event = require_event(&id, current)?;
                    require_pre_drawing(&event)?;
                    event.draws = Some(assignments.clone());
                    event.status = EventStatus::Completed;
                    Ok(TxNext::Write(event.to_value()?))
                }),
            )
            .await?;

        info!("Committed drawing for event {} ({} assignments)", event_id, count);
        Ok(())
    }

    pub async fn run_drawing(&self, event_id: &str) -> Result<Vec<Assignment>, AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let id = event_id.to_string();

        let committed = self
            .store
            .transaction(
                &path,
                Box::new(move |current| {
                    let mut event = require_event(&id, current)?;
                    require_pre_drawing(&event)?;
                    if event.participants.len() < event.min_participants as usize {
                        return Err(AppError::Validation(format!(
                            "event {id} has {} of {} required participants",
                            event.participants.len(),
                            event.min_participants
                        )));
                    }
                    let draws = generate_assignments(&event.participants)?;
                    event.draws = Some(draws);
                    event.status = EventStatus::Completed;
                    Ok(TxNext::Write(event.to_value()?))
                }),
            )
            .await?;

        let value = committed
            .ok_or_else(|| AppError::Store("drawing transaction wrote nothing".to_string()))?;
        let event = Event::from_value(value)?;
        let draws = event.draws.unwrap_or_default();
        info!("Drawing completed for event {} ({} assignments)", event_id, draws.len());
        Ok(draws)
    }

    // Soft delete; the record stays in the store but reads as absent.
    pub async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, event_id);
        let mut fields = serde_json::Map::new();
        fields.insert(
            "status".to_string(),
            serde_json::to_value(EventStatus::Deleted)?,
        );
        self.store.update(&path, fields).await?;
        info!("Deleted event {}", event_id);
        Ok(())
    }
}

fn require_event(event_id: &str, current: Option<Value>) -> Result<Event, AppError> {
    let value = current.ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;
    let event = Event::from_value(value)?;
    if event.status == EventStatus::Deleted {
        return Err(AppError::NotFound(format!("event {event_id}")));
    }
    Ok(event)
}

fn require_pre_drawing(event: &Event) -> Result<(), AppError> {
    match event.status {
        EventStatus::Pending | EventStatus::Active | EventStatus::Drawing => Ok(()),
        EventStatus::Completed => Err(AppError::InvalidState(format!(
            "event {} already has a drawing",
            event.id
        ))),
        EventStatus::Deleted => Err(AppError::NotFound(format!("event {}", event.id))),
    }
}
