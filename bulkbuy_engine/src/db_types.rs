use std::{fmt::Display, str::FromStr};

use bb_common::Money;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------      GroupId       ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct GroupId(pub i64);

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for GroupId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl GroupId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------    Coordinate      ----------------------------------------------------------
/// A WGS84 point. Latitude and longitude in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

//--------------------------------------    GroupStatus     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum GroupStatus {
    /// Accepting commitments.
    Open,
    /// Target or minimum reached; order conversion is in progress.
    Active,
    /// Expired below the minimum. Terminal.
    Failed,
    /// All pending commitments have been processed. Terminal.
    Completed,
    /// Withdrawn by the seller or an admin. Terminal.
    Cancelled,
}

impl GroupStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GroupStatus::Failed | GroupStatus::Completed | GroupStatus::Cancelled)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, GroupStatus::Open)
    }
}

impl Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupStatus::Open => write!(f, "Open"),
            GroupStatus::Active => write!(f, "Active"),
            GroupStatus::Failed => write!(f, "Failed"),
            GroupStatus::Completed => write!(f, "Completed"),
            GroupStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct StatusConversionError(String);

impl FromStr for GroupStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "Active" => Ok(Self::Active),
            "Failed" => Ok(Self::Failed),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(format!("Invalid group status: {s}"))),
        }
    }
}

impl From<String> for GroupStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid group status: {value}. But this conversion cannot fail. Defaulting to Open");
            GroupStatus::Open
        })
    }
}

//------------------------------------   CommitmentStatus   ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// Counted toward the group total; hold placed but not captured.
    Pending,
    /// The group succeeded and the hold was captured.
    Confirmed,
    /// Withdrawn by the buyer, failed upstream, or voided when the group failed.
    Cancelled,
}

impl Display for CommitmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitmentStatus::Pending => write!(f, "Pending"),
            CommitmentStatus::Confirmed => write!(f, "Confirmed"),
            CommitmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for CommitmentStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(format!("Invalid commitment status: {s}"))),
        }
    }
}

impl From<String> for CommitmentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid commitment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            CommitmentStatus::Pending
        })
    }
}

//--------------------------------------    HoldStatus      ----------------------------------------------------------
/// The lifecycle of the payment pre-authorization attached to a commitment:
/// `None → Held → {Captured, Released}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum HoldStatus {
    None,
    Held,
    Captured,
    Released,
}

impl Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldStatus::None => write!(f, "None"),
            HoldStatus::Held => write!(f, "Held"),
            HoldStatus::Captured => write!(f, "Captured"),
            HoldStatus::Released => write!(f, "Released"),
        }
    }
}

impl FromStr for HoldStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Held" => Ok(Self::Held),
            "Captured" => Ok(Self::Captured),
            "Released" => Ok(Self::Released),
            s => Err(StatusConversionError(format!("Invalid hold status: {s}"))),
        }
    }
}

impl From<String> for HoldStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid hold status: {value}. But this conversion cannot fail. Defaulting to None");
            HoldStatus::None
        })
    }
}

//--------------------------------------       Group        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub product_id: String,
    /// Human-readable label for the delivery area, e.g. "Kreuzberg".
    pub area: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
    pub target_quantity: i64,
    pub min_quantity: i64,
    pub discount_percent: i64,
    pub current_quantity: i64,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Group {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.center_lat, self.center_lon)
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Progress toward the target, in whole percent. Saturates at the target.
    pub fn progress_percent(&self) -> i64 {
        if self.target_quantity <= 0 {
            return 0;
        }
        (self.current_quantity * 100 / self.target_quantity).min(100)
    }
}

//--------------------------------------      NewGroup      ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub product_id: String,
    pub area: String,
    pub center: Coordinate,
    pub radius_km: f64,
    pub target_quantity: i64,
    pub min_quantity: i64,
    pub discount_percent: i64,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------     Commitment     ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Commitment {
    pub id: i64,
    pub group_id: GroupId,
    pub buyer_id: String,
    pub quantity: i64,
    /// Discounted per-unit price at the time of the commitment.
    pub unit_price: Money,
    /// Discounted subtotal plus VAT; the amount of the payment hold.
    pub total_price: Money,
    pub postcode: String,
    pub lat: f64,
    pub lon: f64,
    /// Processor hold reference. Empty for seed data where payment was skipped.
    pub hold_ref: Option<String>,
    pub hold_status: HoldStatus,
    pub status: CommitmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commitment {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

//--------------------------------------   NewCommitment    ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewCommitment {
    pub group_id: GroupId,
    pub buyer_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
    pub postcode: String,
    pub location: Coordinate,
    pub hold_ref: Option<String>,
}

//------------------------------------   FulfilmentOrder    ----------------------------------------------------------
/// Created per confirmed commitment when a group converts. Carries the discounted
/// pricing the buyer actually pays.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FulfilmentOrder {
    pub id: i64,
    pub group_id: GroupId,
    pub commitment_id: i64,
    pub buyer_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      Product       ----------------------------------------------------------
/// Local read model of the external product catalog. The engine only consults
/// price and stock; catalog management lives elsewhere.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub unit_price: Money,
    pub available_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub unit_price: Money,
    pub available_stock: i64,
}

//--------------------------------------    EventRecord     ----------------------------------------------------------
/// One row of the append-only group event log.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub group_id: GroupId,
    pub event_type: String,
    /// The serialized [`crate::events::GroupEvent`] payload.
    pub payload: String,
    pub created_at: DateTime<Utc>,
}
