//! sea-orm entities shared by the service and its migrations.

pub mod kv_entry;

pub mod prelude {
    pub use super::kv_entry::Entity as KvEntry;
}
