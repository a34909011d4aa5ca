//! Answer questions from stored documents with a chat model.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ChatError, DatastoreError};
use crate::models::{DocumentChunkWithScore, Query};
use crate::services::completion::{ChatMessage, CompletionProvider};
use crate::services::datastore::DataStore;
use crate::utils::RetryPolicy;

/// Number of chunks placed in the prompt.
pub const CONTEXT_TOP_K: usize = 3;

const CONTEXT_SEPARATOR: &str = " ----------------------------- ";

const NOT_SURE: &str = "Hmm, I'm not sure.";

/// A model reply together with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<DocumentChunkWithScore>,
}

/// Retrieval-grounded chat over a [`DataStore`].
pub struct ChatService {
    datastore: Arc<DataStore>,
    completion: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
}

impl ChatService {
    pub fn new(
        datastore: Arc<DataStore>,
        completion: Arc<dyn CompletionProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            datastore,
            completion,
            retry,
        }
    }

    /// Retrieve context for `content` and ask the model to answer from it.
    pub async fn answer(&self, content: &str) -> Result<ChatAnswer, ChatError> {
        if content.trim().is_empty() {
            return Err(DatastoreError::InvalidRequest("chat content is required".to_string()).into());
        }

        let sources = self
            .datastore
            .query(vec![Query::new(content).with_top_k(CONTEXT_TOP_K)])
            .await?
            .into_iter()
            .next()
            .map(|result| result.results)
            .unwrap_or_default();

        debug!(context_chunks = sources.len(), "built chat context");

        let messages = build_messages(content, &sources);
        let answer = self
            .retry
            .run("chat_completion", || self.completion.complete(&messages))
            .await?;

        info!(context_chunks = sources.len(), answer_len = answer.len(), "chat answered");
        Ok(ChatAnswer { answer, sources })
    }
}

/// Join chunk texts into one context block; newlines become separators.
fn build_context(sources: &[DocumentChunkWithScore]) -> String {
    sources
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\n', CONTEXT_SEPARATOR)
}

fn system_prompt(context: &str) -> String {
    format!(
        "You are an AI assistant providing helpful advice. You are given the following \
extracted parts of a long document and a question. Provide a conversational answer \
based on the context provided.\n\
If you can't find the answer in the context below, just say \"{NOT_SURE}\" Don't try to \
make up an answer.\n\
Reply in the same language as the one used in the user's question.\n\
If the question is not related to the context, politely respond that you are tuned to \
only answer questions that are related to the context.\n\
=========\n\
{context}\n\
========="
    )
}

fn build_messages(content: &str, sources: &[DocumentChunkWithScore]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(&build_context(sources))),
        ChatMessage::user(content),
    ]
}
