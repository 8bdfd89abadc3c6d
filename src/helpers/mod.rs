pub mod browser;
pub mod credentials;
pub mod excel;
pub mod pdf;
pub mod portable;
pub mod springahead;
pub mod store;
pub mod transform;
pub mod workbook;
