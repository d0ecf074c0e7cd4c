pub mod sheets;

pub use sheets::{Credentials, StoreClient};
