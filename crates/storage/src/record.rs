use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value of the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `services.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    Nurse,
    Driver,
    #[serde(rename = "House Help")]
    HouseHelp,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Nurse => "Nurse",
            ServiceType::Driver => "Driver",
            ServiceType::HouseHelp => "House Help",
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Nurse" => Ok(ServiceType::Nurse),
            "Driver" => Ok(ServiceType::Driver),
            "House Help" => Ok(ServiceType::HouseHelp),
            other => Err(format!("unknown service type '{}'", other)),
        }
    }
}

/// Value of the `bookings.status` column.
///
/// The column only constrains the value set. Which transitions are legal is
/// decided by the booking lifecycle, not by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InReview,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InReview,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InReview => "in_review",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown booking status '{}'", s))
    }
}

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub medical_notes: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}

/// Insert payload for `upsert_user`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

/// A row of the `services` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: String,
    pub provider_id: Option<String>,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub name: String,
    pub description: Option<String>,
    pub hourly_rate: Decimal,
    pub availability: Option<serde_json::Value>,
    pub image_url: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}

/// Insert payload for `insert_service`. The id is generated by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewService {
    pub provider_id: String,
    pub service_type: ServiceType,
    pub name: String,
    pub description: Option<String>,
    pub hourly_rate: Decimal,
    pub availability: Option<serde_json::Value>,
    pub image_url: Option<String>,
}

/// A row of the `bookings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub status: BookingStatus,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub scheduled_at: String,
    pub duration_hours: u32,
    pub notes: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}

/// Insert payload for `insert_booking`. Always lands in `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub user_id: String,
    pub service_id: String,
    pub scheduled_at: String,
    pub duration_hours: u32,
    pub notes: Option<String>,
}
