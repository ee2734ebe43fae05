//! In-memory `BookingStore` backend.
//!
//! Holds every table behind a single `tokio::sync::RwLock` so each trait
//! call observes and mutates a consistent view, the same way a single-row
//! statement does in a relational store. Used by tests and by local
//! development servers; nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{
    BookingRecord, BookingStatus, NewBooking, NewService, NewUser, Role, ServiceRecord,
    UserRecord,
};
use crate::traits::BookingStore;

/// Rows are kept with their insertion sequence so list queries have a
/// stable tiebreak when two rows share a timestamp.
#[derive(Default)]
struct Tables {
    seq: u64,
    users: HashMap<String, UserRecord>,
    services: HashMap<String, (u64, ServiceRecord)>,
    bookings: HashMap<String, (u64, BookingRecord)>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// A `BookingStore` that lives entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in the `users` table.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of rows in the `bookings` table.
    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }
}

fn now_rfc3339() -> Result<String, StorageError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| StorageError::Backend(format!("failed to format timestamp: {}", e)))
}

fn fill_if_empty(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| !v.is_empty());
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn upsert_user(&self, user: NewUser) -> Result<(UserRecord, bool), StorageError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.users.get_mut(&user.id) {
            fill_if_empty(&mut existing.email, user.email);
            fill_if_empty(&mut existing.name, user.name);
            if existing.role == Role::Customer && user.role == Role::Provider {
                existing.role = Role::Provider;
            }
            return Ok((existing.clone(), false));
        }

        let record = UserRecord {
            id: user.id.clone(),
            email: user.email.filter(|v| !v.is_empty()),
            name: user.name.filter(|v| !v.is_empty()),
            role: user.role,
            phone: None,
            medical_notes: None,
            created_at: now_rfc3339()?,
        };
        tables.users.insert(user.id, record.clone());
        Ok((record, true))
    }

    async fn get_user(&self, user_id: &str) -> Result<UserRecord, StorageError> {
        self.tables
            .read()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StorageError::UserNotFound {
                user_id: user_id.to_string(),
            })
    }

    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord, StorageError> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&service.provider_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "services",
                column: "provider_id",
                value: service.provider_id,
            });
        }

        let record = ServiceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: Some(service.provider_id),
            service_type: service.service_type,
            name: service.name,
            description: service.description,
            hourly_rate: service.hourly_rate,
            availability: service.availability,
            image_url: service.image_url,
            created_at: now_rfc3339()?,
        };
        let seq = tables.next_seq();
        tables
            .services
            .insert(record.id.clone(), (seq, record.clone()));
        Ok(record)
    }

    async fn get_service(&self, service_id: &str) -> Result<ServiceRecord, StorageError> {
        self.tables
            .read()
            .await
            .services
            .get(service_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| StorageError::ServiceNotFound {
                service_id: service_id.to_string(),
            })
    }

    async fn list_services_by_provider(
        &self,
        provider_id: &str,
    ) -> Result<Vec<ServiceRecord>, StorageError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&(u64, ServiceRecord)> = tables
            .services
            .values()
            .filter(|(_, s)| s.provider_id.as_deref() == Some(provider_id))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, s)| s.clone()).collect())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingRecord, StorageError> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&booking.user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "bookings",
                column: "user_id",
                value: booking.user_id,
            });
        }
        if !tables.services.contains_key(&booking.service_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "bookings",
                column: "service_id",
                value: booking.service_id,
            });
        }

        let record = BookingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: booking.user_id,
            service_id: booking.service_id,
            status: BookingStatus::Pending,
            scheduled_at: booking.scheduled_at,
            duration_hours: booking.duration_hours,
            notes: booking.notes,
            created_at: now_rfc3339()?,
        };
        let seq = tables.next_seq();
        tables
            .bookings
            .insert(record.id.clone(), (seq, record.clone()));
        Ok(record)
    }

    async fn get_booking(&self, booking_id: &str) -> Result<BookingRecord, StorageError> {
        self.tables
            .read()
            .await
            .bookings
            .get(booking_id)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| StorageError::BookingNotFound {
                booking_id: booking_id.to_string(),
            })
    }

    async fn list_bookings_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<BookingRecord>, StorageError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&(u64, BookingRecord)> = tables
            .bookings
            .values()
            .filter(|(_, b)| b.user_id == user_id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| a.scheduled_at.cmp(&b.scheduled_at).then(sa.cmp(sb)));
        Ok(rows.into_iter().map(|(_, b)| b.clone()).collect())
    }

    async fn list_bookings_by_services(
        &self,
        service_ids: &[String],
    ) -> Result<Vec<BookingRecord>, StorageError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&(u64, BookingRecord)> = tables
            .bookings
            .values()
            .filter(|(_, b)| service_ids.contains(&b.service_id))
            .collect();
        // Insertion order; created_at strings do not sort as times.
        rows.sort_by(|(sa, _), (sb, _)| sb.cmp(sa));
        Ok(rows.into_iter().map(|(_, b)| b.clone()).collect())
    }

    async fn transition_booking(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        new_status: BookingStatus,
        notes: Option<String>,
    ) -> Result<BookingRecord, StorageError> {
        let mut tables = self.tables.write().await;
        let (_, booking) =
            tables
                .bookings
                .get_mut(booking_id)
                .ok_or_else(|| StorageError::BookingNotFound {
                    booking_id: booking_id.to_string(),
                })?;

        if booking.status != expected {
            return Err(StorageError::StatusConflict {
                booking_id: booking_id.to_string(),
                expected,
                found: booking.status,
            });
        }

        booking.status = new_status;
        if notes.is_some() {
            booking.notes = notes;
        }
        Ok(booking.clone())
    }

    async fn set_booking_status(
        &self,
        booking_id: &str,
        new_status: BookingStatus,
    ) -> Result<BookingRecord, StorageError> {
        let mut tables = self.tables.write().await;
        let (_, booking) =
            tables
                .bookings
                .get_mut(booking_id)
                .ok_or_else(|| StorageError::BookingNotFound {
                    booking_id: booking_id.to_string(),
                })?;
        booking.status = new_status;
        Ok(booking.clone())
    }
}
