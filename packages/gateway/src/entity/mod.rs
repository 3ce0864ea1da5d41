pub mod activity_log;
pub mod delivery_entry;
pub mod edi_document;
pub mod wire_template;
