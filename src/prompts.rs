use crate::error::{Error, Result};
use crate::file::SourceUnit;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

const ANALYZE_FILE: &str = "analyze_file";
const COMPILE_CHUNK: &str = "compile_chunk";
const STANDARDIZE: &str = "standardize";

pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str = "You are a senior software engineer reviewing source code. \
     You write short, accurate technical analyses in Markdown.";

pub(crate) const COMPILE_SYSTEM_PROMPT: &str = "You are a technical writer maintaining a single codebase report. \
     You merge new findings into the existing report without losing information.";

pub(crate) const STANDARDIZE_SYSTEM_PROMPT: &str = "You are a technical editor. \
     You restructure reports into a fixed outline without adding facts.";

#[derive(Serialize)]
struct AnalyzeContext<'a> {
    root_label: &'a str,
    path: &'a str,
    lines: usize,
    content: &'a str,
}

#[derive(Serialize)]
struct CompileContext<'a> {
    root_label: &'a str,
    chunk_number: usize,
    total_chunks: usize,
    running_report: &'a str,
    chunk_text: &'a str,
}

#[derive(Serialize)]
struct StandardizeContext<'a> {
    title: &'a str,
    report: &'a str,
}

/// Renders the user prompts sent to the text-generation service.
pub(crate) struct PromptEngine {
    tera: Tera,
}

impl PromptEngine {
    /// Creates a prompt engine with the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(ANALYZE_FILE, include_str!("../templates/analyze_file.tera"))
            .map_err(|e| Error::template(ANALYZE_FILE, &e))?;
        tera.add_raw_template(COMPILE_CHUNK, include_str!("../templates/compile_chunk.tera"))
            .map_err(|e| Error::template(COMPILE_CHUNK, &e))?;
        tera.add_raw_template(STANDARDIZE, include_str!("../templates/standardize.tera"))
            .map_err(|e| Error::template(STANDARDIZE, &e))?;

        tera.register_filter("detect_language", detect_language_filter);

        Ok(Self { tera })
    }

    /// Prompt asking for the analysis of a single file.
    pub(crate) fn analyze_file(&self, root_label: &str, unit: &SourceUnit) -> Result<String> {
        self.render(
            ANALYZE_FILE,
            &AnalyzeContext {
                root_label,
                path: &unit.path,
                lines: unit.line_count(),
                content: &unit.content,
            },
        )
    }

    /// Prompt asking to merge chunk `index` (0-based) into the running report.
    pub(crate) fn compile_chunk(
        &self,
        root_label: &str,
        index: usize,
        total_chunks: usize,
        running_report: &str,
        chunk_text: &str,
    ) -> Result<String> {
        self.render(
            COMPILE_CHUNK,
            &CompileContext {
                root_label,
                chunk_number: index + 1,
                total_chunks,
                running_report,
                chunk_text,
            },
        )
    }

    /// Prompt asking to restructure a compiled report.
    pub(crate) fn standardize(&self, title: &str, report: &str) -> Result<String> {
        self.render(STANDARDIZE, &StandardizeContext { title, report })
    }

    fn render<T: Serialize>(&self, name: &str, ctx: &T) -> Result<String> {
        let mut context = Context::new();
        context.insert("ctx", ctx);

        self.tera
            .render(name, &context)
            .map_err(|e| Error::template(name, &e))
    }
}

/// Maps a file path to a code-fence language tag.
fn detect_language_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let Some(path) = value.as_str() else {
        return Ok(Value::String(String::new()));
    };

    let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    let ext = file_name.rsplit_once('.').map_or(file_name.as_str(), |(_, ext)| ext);

    let language = match ext {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" => "bash",
        "ps1" => "powershell",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "xml" => "xml",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" => "ini",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "graphql" | "gql" => "graphql",
        "proto" => "protobuf",
        "dockerfile" => "dockerfile",
        "makefile" => "makefile",
        _ => "",
    };

    Ok(Value::String(language.to_string()))
}
