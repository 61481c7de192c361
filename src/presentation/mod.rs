//! Template views.

pub mod views;
