use crate::models::{AnalysisResult, ImageRef};
use serde::Serialize;
use std::time::Duration;

pub const NOTIFICATION_TITLE: &str = "AI 감정 결과";
pub const NOTIFICATION_MESSAGE: &str = "위험 상품이 아닙니다.";

pub const RESULT_TITLE: &str = "위험 상품입니다.";
pub const RESULT_MESSAGE: &str = "현재로서는 위험 상품으로 분류됩니다.";

/// What the client should do with a verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Presentation {
    /// Open the risky-item detail view. It stays up until the user goes back.
    ShowResult {
        title: String,
        message: String,
        images: Vec<ImageRef>,
        result: AnalysisResult,
    },
    /// Flash a success notice and stay on the upload form.
    Notify {
        title: String,
        message: String,
        dismiss_after_ms: u64,
    },
}

pub fn present(images: Vec<ImageRef>, result: AnalysisResult, window: Duration) -> Presentation {
    if result.is_fake {
        Presentation::ShowResult {
            title: RESULT_TITLE.to_string(),
            message: RESULT_MESSAGE.to_string(),
            images,
            result,
        }
    } else {
        Presentation::Notify {
            title: NOTIFICATION_TITLE.to_string(),
            message: NOTIFICATION_MESSAGE.to_string(),
            dismiss_after_ms: window.as_millis() as u64,
        }
    }
}
