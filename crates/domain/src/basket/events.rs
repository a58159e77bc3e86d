//! Basket domain events.

use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{BasketId, ProductId};

/// Events that can occur on a basket aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BasketEvent {
    /// A customer picked up an empty basket.
    BasketPickedUp(BasketPickedUpData),

    /// A product was put in the basket.
    ProductAdded(ProductAddedData),

    /// A product was taken out of the basket.
    ProductRemoved(ProductRemovedData),
}

impl DomainEvent for BasketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BasketEvent::BasketPickedUp(_) => "BasketPickedUp",
            BasketEvent::ProductAdded(_) => "ProductAdded",
            BasketEvent::ProductRemoved(_) => "ProductRemoved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketPickedUpData {
    pub basket_id: BasketId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAddedData {
    pub product_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRemovedData {
    pub product_id: ProductId,
}

impl BasketEvent {
    pub fn picked_up(basket_id: BasketId) -> Self {
        BasketEvent::BasketPickedUp(BasketPickedUpData { basket_id })
    }

    pub fn product_added(product_id: ProductId) -> Self {
        BasketEvent::ProductAdded(ProductAddedData { product_id })
    }

    pub fn product_removed(product_id: ProductId) -> Self {
        BasketEvent::ProductRemoved(ProductRemovedData { product_id })
    }
}
