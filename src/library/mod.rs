// Library management module
// Finds tracker modules on disk and builds the search catalog from them

pub mod catalog;
pub mod scanner;

pub use catalog::{Catalog, CatalogEntry};
pub use scanner::DirectoryScanner;
