pub mod load_status;
pub mod loader;
pub mod mailbox;

pub use load_status::*;
pub use loader::*;
pub use mailbox::*;
