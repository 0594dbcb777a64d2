//! Validation of Face Fusion generation requests.
//!
//! Both inputs are checked independently so a visitor who left both empty
//! is told about both at once.

/// The inputs a generation request is made of.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    /// Uploaded image as a `data:` URL, if any.
    pub image: Option<&'a str>,
    /// Prompt text as typed.
    pub prompt: &'a str,
}

/// Outcome of validating a [`GenerationInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub image_missing: bool,
    pub prompt_missing: bool,
}

impl ValidationReport {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !self.image_missing && !self.prompt_missing
    }
}

impl GenerationInput<'_> {
    /// Run both checks. An empty image payload counts as missing, as does a
    /// prompt that is empty after trimming.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        ValidationReport {
            image_missing: self.image.is_none_or(str::is_empty),
            prompt_missing: self.prompt.trim().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn test_valid_input() {
        let report = GenerationInput {
            image: Some(IMAGE),
            prompt: "a cyberpunk portrait",
        }
        .validate();
        assert!(report.is_valid());
    }

    #[test]
    fn test_both_missing_reports_both() {
        let report = GenerationInput {
            image: None,
            prompt: "",
        }
        .validate();
        assert_eq!(
            report,
            ValidationReport {
                image_missing: true,
                prompt_missing: true,
            }
        );
    }

    #[test]
    fn test_whitespace_prompt_is_missing() {
        let report = GenerationInput {
            image: Some(IMAGE),
            prompt: " \n\t ",
        }
        .validate();
        assert!(!report.image_missing);
        assert!(report.prompt_missing);
    }

    #[test]
    fn test_empty_image_is_missing() {
        let report = GenerationInput {
            image: Some(""),
            prompt: "anything",
        }
        .validate();
        assert!(report.image_missing);
        assert!(!report.prompt_missing);
    }
}
