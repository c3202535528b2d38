//! Cart models.

use serde::{Deserialize, Serialize};

use larkspur_core::{Price, ProductId, Quantity, VariantId};

use crate::api::{ServerCartItem, VariantDetails};

/// A line of the anonymous cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCartItem {
    pub variant_id: VariantId,
    pub quantity: Quantity,
}

/// Cart kept in the session until the visitor signs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCart {
    pub items: Vec<LocalCartItem>,
}

impl LocalCart {
    /// Quantity of a variant, or 0 when absent.
    #[must_use]
    pub fn quantity_of(&self, variant_id: &VariantId) -> u32 {
        self.items
            .iter()
            .find(|item| &item.variant_id == variant_id)
            .map_or(0, |item| item.quantity.get())
    }

    /// Set a line's quantity, appending the line if absent.
    pub fn set(&mut self, variant_id: &VariantId, quantity: Quantity) {
        match self
            .items
            .iter_mut()
            .find(|item| &item.variant_id == variant_id)
        {
            Some(item) => item.quantity = quantity,
            None => self.items.push(LocalCartItem {
                variant_id: variant_id.clone(),
                quantity,
            }),
        }
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, variant_id: &VariantId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.variant_id != variant_id);
        self.items.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A cart line ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    pub variant_title: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Price,
    pub line_price: Price,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

impl CartLine {
    /// Join a cart entry with its catalog data.
    #[must_use]
    pub fn new(details: VariantDetails, quantity: Quantity) -> Self {
        let line_price = details.price.times(quantity);
        Self {
            variant_id: details.variant_id,
            product_id: details.product_id,
            product_title: details.product_title,
            variant_title: details.variant_title,
            quantity,
            unit_price: details.price,
            line_price,
            image_url: details.image_url,
            in_stock: details.in_stock,
        }
    }
}

/// The whole cart as shown to the visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// `None` for an empty cart or mixed currencies.
    pub subtotal: Option<Price>,
    pub item_count: u32,
}

impl CartView {
    /// Build a view from display lines.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|line| line.quantity.get()).sum();
        let subtotal = lines.split_first().and_then(|(first, rest)| {
            rest.iter()
                .try_fold(first.line_price, |acc, line| {
                    acc.checked_add(&line.line_price)
                })
        });

        Self {
            lines,
            subtotal,
            item_count,
        }
    }

    /// Badge count for a set of raw entries, without catalog lookups.
    #[must_use]
    pub fn count_items(items: &[ServerCartItem]) -> u32 {
        items
            .iter()
            .map(|item| Quantity::clamped(item.quantity).get())
            .sum()
    }
}
