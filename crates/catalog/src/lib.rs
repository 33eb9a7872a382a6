//! Promotion catalog core: turns persisted rule rows into immutable
//! promotion graphs, keeps them coherent per tenant through a stampede-safe
//! cache, and orchestrates discount calculation against the external engine.
//!
//! The moving parts, leaves first:
//!
//! - [`filter`] compiles declaratively-configured attribute pairs into a
//!   product query and resolves the matching product set.
//! - [`assemble`] reads a promotion's rows and produces one immutable
//!   [`promo_model::Promotion`].
//! - [`cache`] stores the serialized catalog per tenant with explicit
//!   stale/loading coordination instead of a single TTL.
//! - [`service`] is the facade: calculation orchestration, listing, export,
//!   activation and the scheduled maintenance hooks.

pub mod assemble;
pub mod cache;
pub mod error;
pub mod filter;
pub mod service;

pub use assemble::Assembler;
pub use cache::{CacheConfig, PromotionCache};
pub use error::CatalogError;
pub use filter::{CompiledFilter, FilterResolver, ProductSetResolution};
pub use service::{CalculationRequest, CartLine, PromotionHead, PromotionService};
