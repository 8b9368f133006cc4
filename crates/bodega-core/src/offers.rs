//! # Offer Registry
//!
//! Promotions the cart engine applies automatically.
//!
//! ## Offer Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NxM  "buy N, pay M"                                                    │
//! │    Inca Kola 3x2: every 3 bottles, 1 is free                           │
//! │    discount = floor(qty / N) × (N − M) × unit_price                    │
//! │                                                                         │
//! │  N+M  "buy N, get M of another product free"                           │
//! │    2 Pan Francés → 1 Galleta Soda Field free                           │
//! │    free units = floor(qty / N) × M, charged at zero                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry keeps offers in registration order. That order matters: when
//! two offers touch the same cart line, the one registered later wins (see
//! [`crate::pricing`]).

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::{validate_date_range, ValidationResult};

// =============================================================================
// Offer
// =============================================================================

/// The rule part of an offer. Exactly one variant's fields exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum OfferKind {
    /// Buy `buy_quantity`, pay `pay_quantity`.
    #[serde(rename = "nxm")]
    BuyNPayM { pay_quantity: i64 },

    /// Buy `buy_quantity` of a trigger product, get `free_quantity` units
    /// of `free_product_id` free. The free product may be the trigger itself.
    #[serde(rename = "n+m")]
    BuyNGetMFree {
        free_product_id: String,
        free_quantity: i64,
    },
}

/// A registered promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Offer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: OfferKind,
    /// Products that trigger the offer.
    pub product_ids: Vec<String>,
    pub buy_quantity: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    /// Inclusive.
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    /// Employee id of the admin who created it.
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Flagged active and `start_date <= now <= end_date`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }

    pub fn applies_to(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id == product_id)
    }

    fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            });
        }
        if self.product_ids.is_empty() {
            return Err(ValidationError::Required {
                field: "product_ids".to_string(),
            });
        }
        if self.buy_quantity < 1 {
            return Err(ValidationError::MustBePositive {
                field: "buy_quantity".to_string(),
            });
        }
        match &self.kind {
            OfferKind::BuyNPayM { pay_quantity } => {
                if *pay_quantity < 0 || *pay_quantity >= self.buy_quantity {
                    return Err(ValidationError::OutOfRange {
                        field: "pay_quantity".to_string(),
                        min: 0,
                        max: self.buy_quantity - 1,
                    });
                }
            }
            OfferKind::BuyNGetMFree {
                free_product_id,
                free_quantity,
            } => {
                if free_product_id.trim().is_empty() {
                    return Err(ValidationError::Required {
                        field: "free_product_id".to_string(),
                    });
                }
                if *free_quantity < 1 {
                    return Err(ValidationError::MustBePositive {
                        field: "free_quantity".to_string(),
                    });
                }
            }
        }
        validate_date_range(self.start_date, self.end_date)
    }
}

/// Fields for an offer that does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffer {
    pub name: String,
    pub description: Option<String>,
    pub kind: OfferKind,
    pub product_ids: Vec<String>,
    pub buy_quantity: i64,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: String,
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub kind: Option<OfferKind>,
    pub product_ids: Option<Vec<String>>,
    pub buy_quantity: Option<i64>,
    pub is_active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

// =============================================================================
// Registry
// =============================================================================

/// Offers in registration order. Serialized as-is into the `offers` blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferRegistry {
    offers: Vec<Offer>,
}

impl OfferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from already-persisted offers, keeping their order.
    pub fn with_offers(offers: Vec<Offer>) -> Self {
        OfferRegistry { offers }
    }

    /// Registers a new offer at the end of the list.
    pub fn add(&mut self, new: NewOffer, now: DateTime<Utc>) -> CoreResult<Offer> {
        let offer = Offer {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            kind: new.kind,
            product_ids: new.product_ids,
            buy_quantity: new.buy_quantity,
            is_active: new.is_active,
            start_date: new.start_date,
            end_date: new.end_date,
            created_by: new.created_by,
            created_at: now,
        };
        offer.validate()?;

        info!(offer_id = %offer.id, name = %offer.name, "Offer registered");
        self.offers.push(offer.clone());
        Ok(offer)
    }

    /// Merges `update` into an existing offer. The merged offer is validated
    /// before anything is written.
    pub fn update(&mut self, id: &str, update: OfferUpdate) -> CoreResult<Offer> {
        let slot = self
            .offers
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| CoreError::OfferNotFound(id.to_string()))?;

        let mut merged = slot.clone();
        if let Some(name) = update.name {
            merged.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            merged.description = description;
        }
        if let Some(kind) = update.kind {
            merged.kind = kind;
        }
        if let Some(product_ids) = update.product_ids {
            merged.product_ids = product_ids;
        }
        if let Some(buy_quantity) = update.buy_quantity {
            merged.buy_quantity = buy_quantity;
        }
        if let Some(is_active) = update.is_active {
            merged.is_active = is_active;
        }
        if let Some(start) = update.start_date {
            merged.start_date = start;
        }
        if let Some(end) = update.end_date {
            merged.end_date = end;
        }
        merged.validate()?;

        *slot = merged.clone();
        info!(offer_id = %id, "Offer updated");
        Ok(merged)
    }

    /// Removes an offer permanently.
    pub fn delete(&mut self, id: &str) -> CoreResult<Offer> {
        let index = self
            .offers
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| CoreError::OfferNotFound(id.to_string()))?;
        info!(offer_id = %id, "Offer deleted");
        Ok(self.offers.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Offer> {
        self.offers.iter().find(|o| o.id == id)
    }

    /// Every offer, in registration order.
    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    /// Offers in effect at `now`, in registration order.
    pub fn active_offers(&self, now: DateTime<Utc>) -> Vec<&Offer> {
        self.offers.iter().filter(|o| o.is_active_at(now)).collect()
    }

    /// Offers in effect at `now` that `product_id` triggers.
    pub fn offers_for_product(&self, product_id: &str, now: DateTime<Utc>) -> Vec<&Offer> {
        self.offers
            .iter()
            .filter(|o| o.is_active_at(now) && o.applies_to(product_id))
            .collect()
    }
}

// =============================================================================
// Shared Handle
// =============================================================================

/// Shared, lock-guarded offer registry.
#[derive(Debug, Clone, Default)]
pub struct OfferHandle {
    inner: Arc<RwLock<OfferRegistry>>,
}

impl OfferHandle {
    pub fn new(registry: OfferRegistry) -> Self {
        OfferHandle {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn with_offers<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&OfferRegistry) -> R,
    {
        let registry = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&registry)
    }

    pub fn with_offers_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut OfferRegistry) -> R,
    {
        let mut registry = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut registry)
    }

    /// Owned copies of the offers active at `now`, in registration order.
    pub fn active_offers(&self, now: DateTime<Utc>) -> Vec<Offer> {
        self.with_offers(|r| r.active_offers(now).into_iter().cloned().collect())
    }

    pub fn snapshot(&self) -> OfferRegistry {
        self.with_offers(OfferRegistry::clone)
    }

    pub fn replace(&self, registry: OfferRegistry) {
        self.with_offers_mut(|r| *r = registry);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
