pub mod ocr_dlq;
pub mod ocr_result;

pub use ocr_dlq::{apply_dead_letter, consume_ocr_dlq};
pub use ocr_result::{apply_ocr_result, consume_ocr_results};
