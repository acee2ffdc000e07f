//! Flutter-facing bindings for the overlay core.

pub mod api;
