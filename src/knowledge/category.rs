//! Document type from file name

/// Keyword table, first match wins
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("procedure", &["procedure", "proc", "instruction"]),
    ("rapport", &["rapport", "report", "compte-rendu"]),
    ("specification", &["spec", "specification", "technique"]),
    ("safety", &["safety", "securite", "sûreté", "surete"]),
    ("maintenance", &["maintenance", "entretien"]),
];

/// Fallback type
pub const DEFAULT_DOC_TYPE: &str = "document";

/// Types reported when nothing is indexed yet
pub const DEFAULT_DOC_TYPES: [&str; 3] = ["procedure", "rapport", "specification"];

/// Categorize a document by keywords in its file name
pub fn categorize_doc(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_DOC_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_demo_documents() {
        assert_eq!(categorize_doc("PROC-PUMP-MAINTENANCE-001.txt"), "procedure");
        assert_eq!(categorize_doc("SPEC-TEMPERATURE-SENSORS-002.txt"), "specification");
        assert_eq!(categorize_doc("RAPPORT-INSPECTION-SEMESTRIELLE-2024.txt"), "rapport");
        assert_eq!(categorize_doc("IAEA_Safety_Standards_NS-R-2.pdf"), "safety");
    }

    #[test]
    fn test_categorize_order_and_fallback() {
        // "procedure" is checked before "maintenance"
        assert_eq!(categorize_doc("maintenance_procedure.md"), "procedure");
        assert_eq!(categorize_doc("plan_entretien.md"), "maintenance");
        assert_eq!(categorize_doc("Guide-Sûreté.txt"), "safety");
        assert_eq!(categorize_doc("notes.txt"), DEFAULT_DOC_TYPE);
    }
}
