// handlers/protected/mod.rs - Tenant-scoped handlers
//
// Every handler here reads the TenantContext attached by the tenant
// resolution middleware and answers 400 when it is empty.
//
// Route Prefix: /api/sample/*

pub mod sample;
