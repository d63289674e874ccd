//! Integration tests
//!
//! Everything except `postgres_store` runs against the in-memory store.


mod inventory_properties;
mod postgres_store;
