mod content;
mod users;

pub use content::{create_content, delete_content, manage_content};
pub use users::{list_users, set_role};
