use crate::errors::ConsignError;
use crate::models::{ImageRef, MAX_IMAGES};

/// Ordered, bounded set of picked images for one form.
#[derive(Debug, Clone, Default)]
pub struct ImageCollector {
    images: Vec<ImageRef>,
}

impl ImageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many more images the picker may offer.
    pub fn remaining(&self) -> usize {
        MAX_IMAGES - self.images.len()
    }

    /// Appends a picked batch in selection order. The batch is rejected as a
    /// whole when it does not fit.
    pub fn add(&mut self, batch: Vec<ImageRef>) -> Result<(), ConsignError> {
        if batch.len() > self.remaining() {
            return Err(ConsignError::CapacityExceeded {
                requested: batch.len(),
                remaining: self.remaining(),
            });
        }
        self.images.extend(batch);
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<ImageRef, ConsignError> {
        if index >= self.images.len() {
            return Err(ConsignError::OutOfRange {
                index,
                len: self.images.len(),
            });
        }
        Ok(self.images.remove(index))
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }
}
