//! Prompt templates for Sift.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub parser: ParserPrompts,
    pub answer: AnswerPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompt for extracting structured entities from a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserPrompts {
    pub template: String,
}

impl Default for ParserPrompts {
    fn default() -> Self {
        Self {
            template: r#"KNOWN SHOW NAMES:
{{show_names}}

KNOWN HOST NAMES:
{{hosts}}

PRIMARY HOST MAP:
{{primary_hosts}}

INSTRUCTIONS
You are a meticulous string analyzer. PARSE the USER QUERY (below) into the JSON object described under RESPONSE FORMAT. Do NOT answer the question.

1. shows
   - Return names from KNOWN SHOW NAMES that the query refers to, converted to their exact known spelling.
   - A reference may differ in punctuation, spelling, capitalization, missing words or initials ("KF podcast" is "Kinda Funny Podcast", "KFGD" is "Kinda Funny Games Daily").
   - Never turn a single first name such as Greg, Colin or Blessing into a show. A match needs at least two words of the known show, or an obvious initialism.
2. hosts
   - Return names from KNOWN HOST NAMES that the query refers to, converted to their exact known spelling ("gregg miller" is "Greg Miller").
   - When only a first name is given, use the PRIMARY HOST MAP.
3. topics
   - The main subjects of the query: nouns, proper nouns, or any quoted phrase.
   - Do NOT repeat shows or hosts as topics. Fix obvious misspellings.
   - If a topic contains a Roman numeral, return it twice, once with the Roman numeral and once with the decimal number ("Rocky IV" and "Rocky 4").
   - If a topic mixes a proper noun with a common noun ("Phantom Liberty expansion"), also return the proper noun on its own ("Phantom Liberty").
4. exact_year, year_range, before_year, after_year
   - Fill at most ONE of these; use null for the others.
   - exact_year: "YYYY" when the user asks about one specific year.
   - year_range: "YYYY-YYYY" when the user asks about a span of years.
   - before_year / after_year: "YYYY" when the user clearly asks for content before or after a year.
   - Valid years are {{corpus_start_year}} through {{current_year}}.

RESPONSE FORMAT (JSON, no markdown, no explanations):
{"shows": ["string"], "hosts": ["string"], "topics": ["string"], "exact_year": "YYYY" | null, "year_range": "YYYY-YYYY" | null, "before_year": "YYYY" | null, "after_year": "YYYY" | null}

EXAMPLE QUERY:
What did Greg say about The Witcher III on P.S. I love you in 2016?

EXAMPLE RESPONSE:
{"shows": ["PS I Love You XOXO"], "hosts": ["Greg Miller"], "topics": ["The Witcher III", "The Witcher 3"], "exact_year": "2016", "year_range": null, "before_year": null, "after_year": null}

USER QUERY:
{{query}}

RESPONSE:"#
                .to_string(),
        }
    }
}

/// Prompt for answer generation over retrieved transcript chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub template: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            template: r#"CONTEXT:
{{context}}

TOPICS:
{{topics}}

INSTRUCTIONS:
- You are a factual Q&A assistant for a video archive.
- The CONTEXT above is a set of transcript snippets from episodes, each followed by its metadata.
- Answer the USER QUERY (below) based ONLY on this CONTEXT.
- Focus on the TOPICS and the USER QUERY. Do not quote the context directly unless asked to.
- Every snippet you rely on must be listed in "sources" using its exact `video_id` and `start_time` metadata.

RULES:
1. Do NOT include knowledge that is not in the CONTEXT.
2. If the CONTEXT lacks the answer, say so directly.
3. The CONTEXT comes from transcripts and may be informal or incomplete.
4. Write the answer as prose paragraphs unless the user asks for a list.
5. Read the whole CONTEXT before answering and reference as many videos as needed.

RESPONSE FORMAT (JSON, no markdown, no explanations):
{"query_response": "string", "sources": [{"video_id": "string", "start_time": 0.0}]}

USER QUERY:
{{query}}

RESPONSE:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let parser_path = custom_path.join("parser.toml");
            if parser_path.exists() {
                let content = std::fs::read_to_string(&parser_path)?;
                prompts.parser = toml::from_str(&content)?;
            }

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template: inserted values are
    /// never expanded again, and unknown placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let placeholder =
            PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("static regex"));

        placeholder
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
