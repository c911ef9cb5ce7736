pub mod error;
pub mod cursor;
pub mod component;
pub mod template;
pub mod builder;

pub use builder::{PathTemplate, UriBuilder};
pub use error::Error;
pub use template::UriTemplate;
