//! Service layer: operations spanning several tables

pub mod template_sync;
