pub mod id;
pub mod naming;
pub mod url;

pub use id::generate_id;
pub use naming::{pluralize, to_camel_case, to_snake_case};
pub use url::{get_base_url, get_origin};
