use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{OutputFormat, QueryResult};
use crate::services::ChatAnswer;
use crate::utils::truncate_chars;

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String;
    fn format_upserted(&self, ids: &[String]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_chat(&self, answer: &ChatAnswer) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub completion_model: String,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub vector_store_points: Option<u64>,
    pub collection: String,
}

fn source_label(result: &crate::models::DocumentChunkWithScore) -> String {
    let doc = &result.metadata.document;
    match (doc.source, doc.url.as_deref()) {
        (Some(source), Some(url)) => format!("{} ({})", source, url),
        (Some(source), None) => source.to_string(),
        (None, Some(url)) => url.to_string(),
        (None, None) => "-".to_string(),
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String {
        let mut output = String::new();

        for result in results {
            if result.is_empty() {
                let _ = writeln!(output, "No results found for: {}\n", result.query);
                continue;
            }

            let _ = writeln!(output, "Results for: \"{}\"\n", result.query);
            for (i, chunk) in result.results.iter().enumerate() {
                let _ = writeln!(output, "{}. [Score: {:.3}] {}", i + 1, chunk.score, chunk.id);
                let _ = writeln!(output, "   Document: {}", chunk.metadata.document_id);
                let _ = writeln!(output, "   Source:   {}", source_label(chunk));
                if let Some(ref author) = chunk.metadata.document.author {
                    let _ = writeln!(output, "   Author:   {}", author);
                }
                let _ = writeln!(output, "   ---");
                for line in truncate_chars(&chunk.text, PREVIEW_CHARS).lines() {
                    let _ = writeln!(output, "   {}", line);
                }
                let _ = writeln!(output);
            }
        }

        output
    }

    fn format_upserted(&self, ids: &[String]) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Upserted {} document(s)", ids.len());
        for id in ids {
            let _ = writeln!(output, "  {}", id);
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");
        let _ = writeln!(output, "Embedding:     {}", status.embedding_model);
        let _ = writeln!(output, "Completion:    {}", status.completion_model);
        let _ = writeln!(output);

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        let _ = writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        );
        if status.vector_store_connected {
            let _ = writeln!(output, "  URL:         {}", status.vector_store_url);
            let _ = writeln!(output, "  Collection:  {}", status.collection);
            match status.vector_store_points {
                Some(points) => {
                    let _ = writeln!(output, "  Chunks:      {}", points);
                }
                None => {
                    let _ = writeln!(output, "  Chunks:      (collection not created)");
                }
            }
        }

        output
    }

    fn format_chat(&self, answer: &ChatAnswer) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "{}\n", answer.answer.trim());
        if !answer.sources.is_empty() {
            let _ = writeln!(output, "Sources:");
            for chunk in &answer.sources {
                let _ = writeln!(
                    output,
                    "  - {} [{:.3}] {}",
                    chunk.metadata.document_id,
                    chunk.score,
                    source_label(chunk)
                );
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String {
        self.render(&serde_json::json!({ "results": results }))
    }

    fn format_upserted(&self, ids: &[String]) -> String {
        self.render(&serde_json::json!({ "ids": ids }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_chat(&self, answer: &ChatAnswer) -> String {
        self.render(answer)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String {
        let mut output = String::new();

        for result in results {
            if result.is_empty() {
                let _ = writeln!(output, "## No results found\n\nQuery: `{}`\n", result.query);
                continue;
            }

            let _ = writeln!(output, "## Results\n");
            let _ = writeln!(output, "**Query:** `{}`\n", result.query);
            for (i, chunk) in result.results.iter().enumerate() {
                let _ = writeln!(output, "### {}. Score: {:.3}\n", i + 1, chunk.score);
                let _ = writeln!(output, "**Document:** `{}`\n", chunk.metadata.document_id);
                let _ = writeln!(output, "**Source:** {}\n", source_label(chunk));
                let _ = writeln!(output, "```");
                let _ = writeln!(output, "{}", chunk.text);
                let _ = writeln!(output, "```\n");
            }
        }

        output
    }

    fn format_upserted(&self, ids: &[String]) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Upserted {} document(s)\n", ids.len());
        for id in ids {
            let _ = writeln!(output, "- `{}`", id);
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Status\n");
        let _ = writeln!(output, "- **Embedding:** {}", status.embedding_model);
        let _ = writeln!(output, "- **Completion:** {}", status.completion_model);
        let _ = writeln!(output);

        let vector_status = if status.vector_store_connected {
            "✅"
        } else {
            "❌"
        };
        let _ = writeln!(
            output,
            "### Vector Store ({}) {}\n",
            status.vector_store_driver, vector_status
        );
        let _ = writeln!(output, "- **URL:** `{}`", status.vector_store_url);
        let _ = writeln!(output, "- **Collection:** {}", status.collection);
        if let Some(points) = status.vector_store_points {
            let _ = writeln!(output, "- **Chunks:** {}", points);
        }

        output
    }

    fn format_chat(&self, answer: &ChatAnswer) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "{}\n", answer.answer.trim());
        if !answer.sources.is_empty() {
            let _ = writeln!(output, "**Sources:**\n");
            for chunk in &answer.sources {
                let _ = writeln!(
                    output,
                    "- `{}` ({:.3})",
                    chunk.metadata.document_id, chunk.score
                );
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

/// Render a failed command, including its context chain, in `format`.
pub fn format_command_error(format: OutputFormat, error: &anyhow::Error) -> String {
    get_formatter(format).format_error(&format!("{error:#}"))
}
