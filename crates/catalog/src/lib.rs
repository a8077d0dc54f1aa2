//! Catalog domain module: products, categories, warehouses.
//!
//! Deterministic domain logic only (no IO, no HTTP, no storage). The stock
//! ledger references these entities but derives stock exclusively from its
//! own movement log.

pub mod category;
pub mod product;
pub mod warehouse;

pub use category::{Category, NewCategory};
pub use product::{NewProduct, Product, ProductPatch, ProductSearch, SearchPage};
pub use warehouse::{NewWarehouse, Warehouse};
