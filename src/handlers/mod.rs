pub mod pages;

pub use pages::index_handler;
