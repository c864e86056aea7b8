pub mod detect;
pub mod error;
pub mod landing;
pub mod listener;

pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use landing::LandingPage;
pub use listener::ServerListener;
