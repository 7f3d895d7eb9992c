// CLI command handlers

pub mod authorize;
