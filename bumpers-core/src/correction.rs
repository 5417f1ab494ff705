//! Corrective guidance generation
//!
//! The dispatcher asks a [`CorrectionGenerator`] for guidance whenever an
//! `auto_correct` or `self_correct` check fails. Generators may be backed
//! by a model; the crate ships a static template.

use crate::error::CorrectionError;

/// Default guidance; `{reason}` is the failure message, `{prior}` the
/// content leading up to the failure
pub const DEFAULT_CORRECTION_TEMPLATE: &str = "Previous Action Blocked: {reason}

Guidance for Agent:
Do not repeat the blocked step. Find a safer way to help the user, or explain why the request cannot be completed.

Remember: Stay focused on helping the user while maintaining safety.";

/// Produces corrective guidance from prior content and a failure reason
pub trait CorrectionGenerator: Send {
    fn generate(&self, prior: &str, reason: &str) -> Result<String, CorrectionError>;
}

impl<F> CorrectionGenerator for F
where
    F: Fn(&str, &str) -> Result<String, CorrectionError> + Send,
{
    fn generate(&self, prior: &str, reason: &str) -> Result<String, CorrectionError> {
        self(prior, reason)
    }
}

/// Fills a text template with `{reason}` and `{prior}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCorrection {
    template: String,
}

impl TemplateCorrection {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for TemplateCorrection {
    fn default() -> Self {
        Self::new(DEFAULT_CORRECTION_TEMPLATE)
    }
}

impl CorrectionGenerator for TemplateCorrection {
    fn generate(&self, prior: &str, reason: &str) -> Result<String, CorrectionError> {
        if self.template.trim().is_empty() {
            return Err(CorrectionError::new("correction template is empty"));
        }
        Ok(self
            .template
            .replace("{reason}", reason)
            .replace("{prior}", prior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_names_reason() {
        let guidance = TemplateCorrection::default()
            .generate("Find flights", "Action 'book' is not in allowed actions: [search]")
            .unwrap();
        assert!(guidance.starts_with(
            "Previous Action Blocked: Action 'book' is not in allowed actions: [search]"
        ));
        assert!(guidance.contains("Guidance for Agent:"));
    }

    #[test]
    fn test_custom_template_placeholders() {
        let gen = TemplateCorrection::new("Blocked ({reason}) after: {prior}");
        assert_eq!(
            gen.generate("step one", "too fast").unwrap(),
            "Blocked (too fast) after: step one"
        );
    }

    #[test]
    fn test_empty_template_fails() {
        assert!(TemplateCorrection::new("  ").generate("", "x").is_err());
    }

    #[test]
    fn test_closure_generator() {
        let gen = |_prior: &str, reason: &str| -> Result<String, CorrectionError> {
            Ok(format!("avoid: {}", reason))
        };
        assert_eq!(gen.generate("", "loops").unwrap(), "avoid: loops");
    }
}
