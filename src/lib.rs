pub mod batch;
pub mod captcha;
pub mod config;
pub mod error;
pub mod identity;
pub mod item;
pub mod portal;
pub mod request;
pub mod rule;
pub mod saver;
pub mod session;
pub mod sink;
pub mod stages;
pub mod table;
pub mod transport;

mod utils;

pub use error::CrawlerError;
pub use utils::{clean_text, strip_label_colon};
