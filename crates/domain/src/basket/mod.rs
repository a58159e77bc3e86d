//! Basket aggregate and related types.

mod aggregate;
mod events;
mod value_objects;

pub use aggregate::{Basket, MAX_PRODUCTS};
pub use events::{BasketEvent, BasketPickedUpData, ProductAddedData, ProductRemovedData};
pub use value_objects::{BasketId, ProductId};

use thiserror::Error;

/// Errors that can occur during basket operations.
#[derive(Debug, Error)]
pub enum BasketError {
    /// The basket already holds the maximum number of products.
    #[error("Basket limit reached: a basket holds at most {limit} products")]
    BasketLimitReached { limit: u32 },

    /// The product to remove is not in the basket.
    #[error("Product not in basket: {product_id}")]
    ProductNotInBasket { product_id: ProductId },
}
