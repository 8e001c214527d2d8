//! SFTP file server backed by the local filesystem

mod server;
mod status;

pub use server::{FileServer, MAX_NAMES_PER_READDIR, MAX_READ_LEN};
pub use status::status_from_io;
