// handlers/public/mod.rs - Public handlers (no tenant required)
//
// Route Prefix: /api (e.g., /api, /api/health)
// Middleware: tenant resolution runs, but these handlers ignore the result

pub mod health;

pub use health::{health, root};
