//! Keyword scan over captured interpreter output

use root_mcp_config::domains::execution::DEFAULT_ERROR_KEYWORDS;

/// Finds the first line of output that looks like an interpreter diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorScanner {
    keywords: Vec<String>,
}

impl ErrorScanner {
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| -> String { k.into() })
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The first line containing a keyword, trimmed
    pub fn scan(&self, text: &str) -> Option<String> {
        if self.keywords.is_empty() {
            return None;
        }

        text.lines()
            .find(|line| self.keywords.iter().any(|k| line.contains(k.as_str())))
            .map(|line| line.trim().to_string())
    }
}

impl Default for ErrorScanner {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_KEYWORDS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cling_compile_error() {
        let stderr = "input_line_8:2:3: error: use of undeclared identifier 'hh'\n  hh->Fill(1);\n  ^\n";
        assert_eq!(
            ErrorScanner::default().scan(stderr).as_deref(),
            Some("input_line_8:2:3: error: use of undeclared identifier 'hh'")
        );
    }

    #[test]
    fn test_root_error_message() {
        let stderr = "Info in <TCanvas::Print>: png file c1.png has been created\n  Error in <TFile::TFile>: file missing.root does not exist\n";
        assert_eq!(
            ErrorScanner::default().scan(stderr).as_deref(),
            Some("Error in <TFile::TFile>: file missing.root does not exist")
        );
    }

    #[test]
    fn test_crash_banner() {
        let stderr = "\n *** Break *** segmentation violation\n";
        assert_eq!(
            ErrorScanner::default().scan(stderr).as_deref(),
            Some("*** Break *** segmentation violation")
        );
    }

    #[test]
    fn test_clean_output() {
        let scanner = ErrorScanner::default();
        assert_eq!(scanner.scan(""), None);
        assert_eq!(scanner.scan("Info in <TCanvas::Print>: created\n"), None);
        // Matching is case sensitive
        assert_eq!(scanner.scan("no errors: all fine\n"), None);
    }

    #[test]
    fn test_custom_keywords() {
        let scanner = ErrorScanner::new(["Warning in <", ""]);
        assert_eq!(scanner.keywords().len(), 1);
        assert_eq!(
            scanner.scan("Warning in <TH1F::Fill>: x\n").as_deref(),
            Some("Warning in <TH1F::Fill>: x")
        );
        assert_eq!(ErrorScanner::new(Vec::<String>::new()).scan("error: x"), None);
    }
}
