//! Item catalog: reference data consumed by requisitions, stock and plans.

pub mod item;

pub use item::{
    CatalogCommand, CatalogEvent, CatalogItem, CatalogItemId, ItemCategoryId, RegisterItem,
};
