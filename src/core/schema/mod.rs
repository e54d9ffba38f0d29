//! Schema reconciliation for the tabular source

pub mod reconciler;

pub use reconciler::{
    apply_mapping, header_similarity, next_version, record_schema_version, Reconciliation,
    SchemaReconciler,
};
