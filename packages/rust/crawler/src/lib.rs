//! Page rendering, field extraction, listing traversal, and detail resolution.
//!
//! This crate provides:
//! - [`render`]: the [`PageRenderer`] seam and the per-run [`RenderSession`]
//! - [`extract`]: pure field extractors and compiled [`Selectors`]
//! - [`listing`]: [`ListingWalker`], listing page → candidate blocks
//! - [`detail`]: [`DetailResolver`], detail page → category + coordinates

pub mod detail;
pub mod extract;
pub mod listing;
pub mod render;

pub use detail::DetailResolver;
pub use extract::{Selectors, extract_coordinates, parse_start_date};
pub use listing::{Candidates, ListingWalker};
pub use render::{HttpRenderer, PageRenderer, RenderSession};
