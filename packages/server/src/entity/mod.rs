pub mod asset;
pub mod note;
pub mod ocr_outbox;
