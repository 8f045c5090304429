//! Flutter-facing bindings for the SecondBrain link-graph core.

pub mod api;
