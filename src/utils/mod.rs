pub mod serde_arc;
