pub mod directory;

pub use directory::{StoreTenantDirectory, TenantDirectory};
