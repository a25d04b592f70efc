//! Query templates for per-field extraction.
//!
//! Centralising every template here serves two purposes:
//!
//! 1. **Single source of truth** — changing how a field is asked for (e.g.
//!    pinning the publication-date format) requires editing exactly one
//!    place.
//!
//! 2. **Testability** — unit tests can render and inspect the queries
//!    without a live model, making template regressions easy to catch.
//!
//! Every template has exactly one free variable, `{text}`, bound to the
//! full reflowed document body. Fields are deliberately independent: no
//! template references another field's answer, so the queries carry no
//! conversation state and may be issued in any order.

use crate::output::ExtractionField;

/// Placeholder substituted with the document text when rendering.
const TEXT_PLACEHOLDER: &str = "{text}";

pub const TITLE_TEMPLATE: &str =
    "Extract the title of the following scientific research paper:\n{text}";

pub const AUTHORS_TEMPLATE: &str =
    "Extract the author(s) of the following scientific research paper:\n{text}";

pub const PUBLICATION_DATE_TEMPLATE: &str =
    "Extract the publication date of the following scientific research paper, format as YYYY/MM/DD:\n{text}";

pub const ABSTRACT_TEMPLATE: &str =
    "Extract the abstract of the following scientific research paper:\n{text}";

pub const KEY_FINDINGS_TEMPLATE: &str =
    "Identify key findings in the following scientific research paper:\n{text}";

pub const METHODOLOGY_TEMPLATE: &str =
    "Identify the methodology used in the following scientific research paper:\n{text}";

pub const SUMMARY_TEMPLATE: &str =
    "Generate a brief summary of the following scientific research paper:\n{text}";

pub const KEYWORDS_TEMPLATE: &str =
    "Generate keywords for the following scientific research paper:\n{text}";

/// The raw template for a field.
pub fn template(field: ExtractionField) -> &'static str {
    match field {
        ExtractionField::Title => TITLE_TEMPLATE,
        ExtractionField::Authors => AUTHORS_TEMPLATE,
        ExtractionField::PublicationDate => PUBLICATION_DATE_TEMPLATE,
        ExtractionField::Abstract => ABSTRACT_TEMPLATE,
        ExtractionField::KeyFindings => KEY_FINDINGS_TEMPLATE,
        ExtractionField::Methodology => METHODOLOGY_TEMPLATE,
        ExtractionField::Summary => SUMMARY_TEMPLATE,
        ExtractionField::Keywords => KEYWORDS_TEMPLATE,
    }
}

/// Render the query for `field` with `text` bound to the placeholder.
pub fn render(field: ExtractionField, text: &str) -> String {
    template(field).replace(TEXT_PLACEHOLDER, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_has_exactly_one_placeholder() {
        for field in ExtractionField::ALL {
            let t = template(field);
            assert_eq!(
                t.matches(TEXT_PLACEHOLDER).count(),
                1,
                "template for {field} must bind the text exactly once"
            );
        }
    }

    #[test]
    fn render_binds_document_text() {
        let q = render(ExtractionField::Title, "THE DOCUMENT");
        assert!(q.ends_with("THE DOCUMENT"));
        assert!(!q.contains(TEXT_PLACEHOLDER));
        assert!(q.starts_with("Extract the title"));
    }

    #[test]
    fn render_with_empty_text_is_still_a_defined_query() {
        let q = render(ExtractionField::Summary, "");
        assert!(q.starts_with("Generate a brief summary"));
        assert!(q.ends_with(":\n"));
    }

    #[test]
    fn publication_date_pins_format() {
        assert!(template(ExtractionField::PublicationDate).contains("YYYY/MM/DD"));
    }
}
