//! Sea-ORM entities for rentnest-store

pub mod kv_entries;

pub use kv_entries::Entity as KvEntries;
