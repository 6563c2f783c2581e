//! # API Route Modules
//!
//! - `circles`: circle, membership and round lifecycle endpoints.

pub mod circles;
