pub mod irq;
pub mod reader_manager;
