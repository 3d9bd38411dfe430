use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("\"{product}\" is out of stock (available: {available})")]
    OutOfStock { product: String, available: i32 },

    #[error("quantity must be positive, got {quantity}")]
    InvalidQuantity { quantity: i32 },
}

/// One candidate purchase line: a product snapshot plus a quantity.
/// `stock_at_add` is the stock known when the product was fetched; it backs
/// a soft pre-check only, never the correctness mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock_at_add: i32,
}

/// Candidate purchase lines held before an order exists. Owned by exactly
/// one checkout call; the workflow clears it only after a successful
/// confirmation, so a failed validation leaves it intact for adjustment.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

/// Serialized shape of one cart line in the view layer's session store.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartLineSnapshot {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub stock: i32,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cart from the session snapshot the view layer kept across
    /// page loads. Re-applies the merge and soft stock validation, so a
    /// tampered or outdated snapshot fails the same way a live add would.
    pub fn from_snapshot(items: Vec<CartLineSnapshot>) -> Result<Self, CartError> {
        let mut cart = Cart::new();
        for item in items {
            cart.add_line(CartLine {
                product_id: item.id,
                name: item.name,
                unit_price: item.price,
                quantity: item.quantity,
                stock_at_add: item.stock,
            })?;
        }
        Ok(cart)
    }

    /// Add `quantity` units of `product`. Merges into an existing line for
    /// the same product; rejects without mutating when the combined quantity
    /// exceeds the stock snapshot.
    pub fn add(&mut self, product: &Product, quantity: i32) -> Result<(), CartError> {
        self.add_line(CartLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            stock_at_add: product.stock,
        })
    }

    fn add_line(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity <= 0 {
            return Err(CartError::InvalidQuantity {
                quantity: line.quantity,
            });
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            Some(existing) => {
                let merged = existing.quantity.checked_add(line.quantity).ok_or(
                    CartError::InvalidQuantity {
                        quantity: line.quantity,
                    },
                )?;
                if merged > line.stock_at_add {
                    return Err(CartError::OutOfStock {
                        product: line.name,
                        available: line.stock_at_add - existing.quantity,
                    });
                }
                existing.quantity = merged;
                // Most recent snapshot wins.
                existing.stock_at_add = line.stock_at_add;
            }
            None => {
                if line.quantity > line.stock_at_add {
                    return Err(CartError::OutOfStock {
                        product: line.name,
                        available: line.stock_at_add,
                    });
                }
                self.lines.push(line);
            }
        }
        Ok(())
    }

    /// Sum of quantity x unit price over all lines, exact to 2 decimals.
    pub fn total(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum::<Decimal>()
            .round_dp(2)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(name: &str, price: &str, stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            establishment_id: Uuid::new_v4(),
            name: name.to_string(),
            category: None,
            price: price.parse().unwrap(),
            stock,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_is_exact_sum_of_lines() {
        let mut cart = Cart::new();
        cart.add(&product("Agua", "2.50", 10), 3).unwrap();
        cart.add(&product("Espetinho", "7.90", 10), 2).unwrap();

        assert_eq!(cart.total(), "23.30".parse::<Decimal>().unwrap());
    }

    #[test]
    fn total_is_independent_of_insertion_order() {
        let a = product("A", "0.10", 100);
        let b = product("B", "19.99", 100);
        let c = product("C", "3.33", 100);

        let mut first = Cart::new();
        first.add(&a, 7).unwrap();
        first.add(&b, 1).unwrap();
        first.add(&c, 3).unwrap();

        let mut second = Cart::new();
        second.add(&c, 3).unwrap();
        second.add(&a, 7).unwrap();
        second.add(&b, 1).unwrap();

        assert_eq!(first.total(), second.total());
        assert_eq!(first.total(), "30.68".parse::<Decimal>().unwrap());
    }

    #[test]
    fn total_does_not_drift_across_many_lines() {
        let mut cart = Cart::new();
        let p = product("Bala", "0.10", 1000);
        for _ in 0..300 {
            cart.add(&p, 1).unwrap();
        }
        assert_eq!(cart.total(), "30.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn re_add_merges_into_one_line() {
        let mut cart = Cart::new();
        let p = product("Refrigerante", "5.00", 10);
        cart.add(&p, 2).unwrap();
        cart.add(&p, 3).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn add_beyond_snapshot_stock_is_rejected_without_mutation() {
        let mut cart = Cart::new();
        let p = product("Cerveja", "8.00", 3);
        cart.add(&p, 2).unwrap();

        let err = cart.add(&p, 2).unwrap_err();
        assert_eq!(
            err,
            CartError::OutOfStock {
                product: "Cerveja".to_string(),
                available: 1,
            }
        );
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn first_add_beyond_stock_is_rejected() {
        let mut cart = Cart::new();
        let p = product("Caipirinha", "12.00", 1);
        let err = cart.add(&p, 2).unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { available: 1, .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let mut cart = Cart::new();
        let p = product("Pastel", "6.00", 5);
        assert_eq!(
            cart.add(&p, 0),
            Err(CartError::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(
            cart.add(&p, -1),
            Err(CartError::InvalidQuantity { quantity: -1 })
        );
    }

    #[test]
    fn snapshot_round_trip_preserves_lines_and_total() {
        let snapshot = vec![
            CartLineSnapshot {
                id: Uuid::new_v4(),
                name: "P1".into(),
                price: "5.00".parse().unwrap(),
                quantity: 2,
                stock: 10,
            },
            CartLineSnapshot {
                id: Uuid::new_v4(),
                name: "P2".into(),
                price: "3.50".parse().unwrap(),
                quantity: 1,
                stock: 4,
            },
        ];

        let cart = Cart::from_snapshot(snapshot).unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.total(), "13.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn snapshot_with_duplicate_product_merges() {
        let id = Uuid::new_v4();
        let line = |qty: i32| CartLineSnapshot {
            id,
            name: "P1".into(),
            price: "2.00".parse().unwrap(),
            quantity: qty,
            stock: 10,
        };

        let cart = Cart::from_snapshot(vec![line(2), line(3)]).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn merged_quantity_overflow_is_rejected() {
        let id = Uuid::new_v4();
        let line = |qty: i32| CartLineSnapshot {
            id,
            name: "P1".into(),
            price: "1.00".parse().unwrap(),
            quantity: qty,
            stock: i32::MAX,
        };

        let err = Cart::from_snapshot(vec![line(i32::MAX), line(2)]).unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity { quantity: 2 });
    }

    #[test]
    fn clear_empties_the_cart() {
        let mut cart = Cart::new();
        cart.add(&product("X", "1.00", 5), 1).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }
}
