pub mod database_migration;
pub mod manage_documents;
pub mod manage_positions;
pub mod manage_users;
mod util;
