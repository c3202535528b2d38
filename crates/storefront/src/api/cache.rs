//! Cache types for catalog responses.

use larkspur_core::{ProductId, VariantId};

use super::types::{ProductDetail, ProductFilter, ProductPage, VariantDetails};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Variant(VariantId),
    Product(ProductId),
    Products(ProductFilter),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Variant(Box<VariantDetails>),
    Product(Box<ProductDetail>),
    Products(ProductPage),
}
