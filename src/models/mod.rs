pub mod entry;
pub mod invoice;
