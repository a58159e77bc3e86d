//! Basket aggregate implementation.

use std::collections::HashMap;

use common::{AggregateId, Identifier};

use crate::aggregate::{Aggregate, AggregateRoot};

use super::{BasketError, BasketEvent, BasketId, ProductId};

/// Maximum number of products a basket can hold.
pub const MAX_PRODUCTS: u32 = 3;

/// Basket aggregate root.
///
/// A shopping basket that a customer picks up and fills with products.
#[derive(Debug, Clone, PartialEq)]
pub struct Basket {
    root: AggregateRoot<BasketEvent>,

    basket_id: BasketId,

    /// Quantity per product.
    products: HashMap<ProductId, u32>,
}

impl Aggregate for Basket {
    type Id = BasketId;
    type Event = BasketEvent;
    type Error = BasketError;

    fn aggregate_type() -> &'static str {
        "Basket"
    }

    fn initial(id: AggregateId) -> Self {
        Self {
            basket_id: BasketId::from_uuid(id.as_uuid()),
            root: AggregateRoot::new(id),
            products: HashMap::new(),
        }
    }

    fn root(&self) -> &AggregateRoot<BasketEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<BasketEvent> {
        &mut self.root
    }

    fn apply(&mut self, event: BasketEvent) {
        match event {
            BasketEvent::BasketPickedUp(_) => {
                self.products.clear();
            }
            BasketEvent::ProductAdded(data) => {
                *self.products.entry(data.product_id).or_insert(0) += 1;
            }
            BasketEvent::ProductRemoved(data) => {
                if let Some(quantity) = self.products.get_mut(&data.product_id) {
                    *quantity -= 1;
                    if *quantity == 0 {
                        self.products.remove(&data.product_id);
                    }
                }
            }
        }
    }
}

// Query methods
impl Basket {
    pub fn basket_id(&self) -> BasketId {
        self.basket_id
    }

    /// Returns true if at least one of the product is in the basket.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.products.contains_key(product_id)
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.products.get(product_id).copied().unwrap_or(0)
    }

    /// Returns the total number of products, counting quantities.
    pub fn product_count(&self) -> u32 {
        self.products.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

// Command methods
impl Basket {
    /// Picks up a new, empty basket.
    pub fn pick_up(basket_id: BasketId) -> Self {
        let mut basket = Self::initial(basket_id.aggregate_id());
        basket.record_that(BasketEvent::picked_up(basket_id));
        basket
    }

    /// Puts a product in the basket.
    pub fn add_product(&mut self, product_id: ProductId) -> Result<(), BasketError> {
        if self.product_count() >= MAX_PRODUCTS {
            return Err(BasketError::BasketLimitReached {
                limit: MAX_PRODUCTS,
            });
        }

        self.record_that(BasketEvent::product_added(product_id));
        Ok(())
    }

    /// Takes one of a product out of the basket.
    pub fn remove_product(&mut self, product_id: ProductId) -> Result<(), BasketError> {
        if !self.contains(&product_id) {
            return Err(BasketError::ProductNotInBasket { product_id });
        }

        self.record_that(BasketEvent::product_removed(product_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::Version;

    fn sku(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[test]
    fn pick_up_records_genesis_event() {
        let basket_id = BasketId::new();
        let basket = Basket::pick_up(basket_id);

        assert_eq!(basket.basket_id(), basket_id);
        assert_eq!(basket.id(), &basket_id.aggregate_id());
        assert_eq!(basket.version(), Version::initial());
        assert!(basket.is_empty());
        assert_eq!(
            basket.uncommitted_events(),
            &[BasketEvent::picked_up(basket_id)]
        );
    }

    #[test]
    fn add_product_counts_quantities() {
        let mut basket = Basket::pick_up(BasketId::new());
        basket.add_product(sku("SKU-1")).unwrap();
        basket.add_product(sku("SKU-1")).unwrap();
        basket.add_product(sku("SKU-2")).unwrap();

        assert_eq!(basket.quantity_of(&sku("SKU-1")), 2);
        assert_eq!(basket.product_count(), 3);
        assert_eq!(basket.uncommitted_events().len(), 4);
    }

    #[test]
    fn add_product_beyond_limit_fails_without_recording() {
        let mut basket = Basket::pick_up(BasketId::new());
        for _ in 0..MAX_PRODUCTS {
            basket.add_product(sku("SKU-1")).unwrap();
        }

        let result = basket.add_product(sku("SKU-2"));
        assert!(matches!(
            result,
            Err(BasketError::BasketLimitReached { limit: 3 })
        ));
        assert_eq!(basket.uncommitted_events().len(), 1 + MAX_PRODUCTS as usize);
        assert!(!basket.contains(&sku("SKU-2")));
    }

    #[test]
    fn remove_product_decrements_quantity() {
        let mut basket = Basket::pick_up(BasketId::new());
        basket.add_product(sku("SKU-1")).unwrap();
        basket.add_product(sku("SKU-1")).unwrap();

        basket.remove_product(sku("SKU-1")).unwrap();
        assert_eq!(basket.quantity_of(&sku("SKU-1")), 1);

        basket.remove_product(sku("SKU-1")).unwrap();
        assert!(!basket.contains(&sku("SKU-1")));
        assert!(basket.is_empty());
    }

    #[test]
    fn remove_missing_product_fails() {
        let mut basket = Basket::pick_up(BasketId::new());

        let result = basket.remove_product(sku("SKU-9"));
        assert!(matches!(
            result,
            Err(BasketError::ProductNotInBasket { product_id }) if product_id == sku("SKU-9")
        ));
        assert_eq!(basket.uncommitted_events().len(), 1);
    }

    #[test]
    fn removed_product_frees_room_under_limit() {
        let mut basket = Basket::pick_up(BasketId::new());
        for id in ["SKU-1", "SKU-2", "SKU-3"] {
            basket.add_product(sku(id)).unwrap();
        }
        basket.remove_product(sku("SKU-2")).unwrap();

        assert!(basket.add_product(sku("SKU-4")).is_ok());
        assert_eq!(basket.product_count(), MAX_PRODUCTS);
    }
}
