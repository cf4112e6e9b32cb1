use crate::errors::ConsignError;
use crate::models::{Condition, ImageRef, MIN_IMAGES, ProductInfo};

/// Message shown when a submission is blocked.
pub const INCOMPLETE_FORM_MESSAGE: &str = "이미지와 모든 상품 정보를 입력해주세요.";

pub fn can_submit(
    images: &[ImageRef],
    item_name: &str,
    model_name: &str,
    condition: Option<Condition>,
) -> bool {
    images.len() >= MIN_IMAGES
        && !item_name.trim().is_empty()
        && !model_name.trim().is_empty()
        && condition.is_some()
}

/// All-or-nothing gate run before any network call.
pub fn validate_submission(images: &[ImageRef], info: &ProductInfo) -> Result<(), ConsignError> {
    if can_submit(images, &info.item_name, &info.model_name, info.condition) {
        Ok(())
    } else {
        Err(ConsignError::Validation(INCOMPLETE_FORM_MESSAGE.to_string()))
    }
}
