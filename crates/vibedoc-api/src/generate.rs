//! README Generation Seam
//!
//! The generation collaborator consumes one allowance unit per call and
//! performs no quota logic of its own; authorize/deny is resolved by the
//! handlers before anything here runs. The LLM-backed implementation
//! lives behind the trait; the template generator keeps the API
//! self-contained.

use serde::{Deserialize, Serialize};

/// Stylistic vibe for the generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Minimal,
    Corporate,
    Playful,
    Hacker,
}

impl Vibe {
    fn tagline(&self) -> &'static str {
        match self {
            Self::Minimal => "Exactly what it says on the tin.",
            Self::Corporate => "Enterprise-ready. Battle-tested. Compliant.",
            Self::Playful => "Made with questionable amounts of coffee.",
            Self::Hacker => "0 days since last refactor.",
        }
    }
}

/// Produces README text for a repository
pub trait ReadmeGenerator: Send + Sync {
    /// Generate a README for a repository URL in the given vibe
    fn generate(&self, repo_url: &str, vibe: Vibe) -> String;
    /// Rewrite existing README text into the given vibe
    fn rewrite(&self, existing: &str, vibe: Vibe) -> String;
}

/// Offline template generator, used until an LLM backend is wired in
pub struct TemplateGenerator;

impl ReadmeGenerator for TemplateGenerator {
    fn generate(&self, repo_url: &str, vibe: Vibe) -> String {
        let name = repo_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("project");

        format!(
            "# {name}\n\n> {tagline}\n\n## About\n\nGenerated from {repo_url}.\n\n\
             ## Installation\n\nSee the repository for build instructions.\n\n\
             ## License\n\nSee LICENSE.\n",
            name = name,
            tagline = vibe.tagline(),
            repo_url = repo_url,
        )
    }

    fn rewrite(&self, existing: &str, vibe: Vibe) -> String {
        format!("> {}\n\n{}", vibe.tagline(), existing)
    }
}
