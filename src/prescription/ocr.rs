//! OCR collaborator / OCR 文本识别
//!
//! Text extraction is delegated to an [`OcrEngine`]. The production engine
//! shells out to the `tesseract` CLI; tests use [`MockOcrEngine`].

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::OcrConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcrError {
    #[error("{0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Failed(String),
}

impl From<std::io::Error> for OcrError {
    fn from(e: std::io::Error) -> Self {
        OcrError::Io(e.to_string())
    }
}

/// Image bytes -> text / 图片转文本
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// `extension` is the lowercase file extension of the upload
    async fn extract_text(&self, image: &[u8], extension: &str) -> Result<String, OcrError>;
}

/// Tesseract command-line engine / 调用 tesseract 命令行
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: PathBuf::from(&config.tesseract_path),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn extract_text(&self, image: &[u8], extension: &str) -> Result<String, OcrError> {
        if extension.eq_ignore_ascii_case("pdf") {
            return Err(OcrError::UnsupportedFormat("PDF OCR not supported".to_string()));
        }

        // tesseract 需要文件路径，先写入临时文件
        // 临时文件在 drop 时删除
        let file = tempfile::Builder::new()
            .prefix("prescription-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        tokio::fs::write(file.path(), image).await?;

        let output = tokio::process::Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| OcrError::Failed(format!("failed to run {:?}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|_| OcrError::Failed("tesseract produced non UTF-8 output".to_string()))?;

        tracing::debug!("OCR extracted {} characters", text.len());
        Ok(text)
    }
}

/// Engine returning a fixed outcome / 固定结果的模拟引擎
pub struct MockOcrEngine {
    result: Result<String, OcrError>,
}

impl MockOcrEngine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { result: Ok(text.into()) }
    }

    pub fn failing(error: OcrError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn extract_text(&self, _image: &[u8], _extension: &str) -> Result<String, OcrError> {
        self.result.clone()
    }
}
