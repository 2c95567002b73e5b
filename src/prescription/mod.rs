//! Prescription analysis: OCR collaborator + text matcher / 处方分析

pub mod matcher;
pub mod ocr;

pub use matcher::{analyze_ocr_result, extract_medicines, Confidence, ExtractedMedicine, NOT_IN_DATASET};
pub use ocr::{MockOcrEngine, OcrEngine, OcrError, TesseractOcr};
