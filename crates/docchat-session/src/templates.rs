//! Canned system instructions.

use std::fmt;
use std::str::FromStr;

use docchat_core::Error;

/// A named system-instruction preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    React,
    Academic,
    Legal,
    Summary,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::React,
        Template::Academic,
        Template::Legal,
        Template::Summary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Template::React => "react",
            Template::Academic => "academic",
            Template::Legal => "legal",
            Template::Summary => "summary",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Template::React => {
                "You are an expert React and TypeScript developer. Focus on clean, functional components, hooks, and modern best practices."
            }
            Template::Academic => {
                "You are a helpful academic research assistant. Provide citations, summarize key findings, and maintain a formal tone."
            }
            Template::Legal => {
                "You are a senior legal analyst. Analyze documents for clauses, risks, and definitions. Be precise and cite page numbers."
            }
            Template::Summary => {
                "You are a concise summarizer. Extract the most important points from the documents in bullet points."
            }
        }
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Template::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "unknown template '{}' (expected one of: react, academic, legal, summary)",
                    s.trim()
                ))
            })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
