//! Catalog description improver

use crate::provider::{GenerationProvider, ProviderError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRequest {
    pub product_name: String,
    pub current_description: String,
}

impl CatalogRequest {
    pub fn is_ready(&self) -> bool {
        !self.product_name.trim().is_empty()
    }
}

pub fn catalog_prompt(request: &CatalogRequest) -> String {
    let current = request.current_description.trim();
    format!(
        "Act as an expert copywriter for online catalogs and marketplaces.\n\
         Product: {}\n\
         Current description: {}\n\
         Rewrite it in Markdown with:\n\
         - a catchy title as an H1 heading\n\
         - a short paragraph about the benefits\n\
         - a bullet list of the main features\n\
         Highlight the selling points in **bold**, use a few emojis and keep it search friendly.",
        request.product_name.trim(),
        if current.is_empty() { "(none)" } else { current }
    )
}

pub async fn improve_description(
    provider: &dyn GenerationProvider,
    request: &CatalogRequest,
) -> Result<String, ProviderError> {
    let text = provider.generate_text(&catalog_prompt(request)).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::Malformed("description is empty".to_string()));
    }
    Ok(text.to_string())
}

/// Markdown headings and bold markers removed, for the terminal preview.
pub fn plain_lines(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .map(|line| line.trim_start_matches('#').trim_start().replace("**", ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OfflineProvider;

    #[test]
    fn test_prompt_marks_missing_description() {
        let request = CatalogRequest {
            product_name: "Olive oil".into(),
            current_description: "  ".into(),
        };
        let prompt = catalog_prompt(&request);
        assert!(prompt.contains("Product: Olive oil"));
        assert!(prompt.contains("Current description: (none)"));
    }

    #[test]
    fn test_plain_lines_strip_markdown() {
        let lines = plain_lines("# Fresh Bread\nBaked **daily**.\n- crusty");
        assert_eq!(lines, vec!["Fresh Bread", "Baked daily.", "- crusty"]);
    }

    #[tokio::test]
    async fn test_offline_draft_keeps_product() {
        let request = CatalogRequest {
            product_name: "Honey".into(),
            current_description: "Raw honey from local farms".into(),
        };
        let text = improve_description(&OfflineProvider::new(), &request).await.unwrap();
        assert!(text.contains("Product: Honey"));
        assert!(text.contains("Current description: Raw honey"));
    }
}
