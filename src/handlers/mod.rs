// handlers/mod.rs - Handler tiers
//
// Public (no tenant needed) → Protected (tenant context required)
pub mod protected;
pub mod public;
