//! # Context Composition
//!
//! Derives the transient payloads sent to the two sources. Nothing here
//! mutates stored messages.
//!
//! Grounding is at most two optional blocks, always in this order:
//! 1. documents (`--- SOURCE DOCUMENTS FOR CITATION ---`)
//! 2. rules (`--- YOUR LOGIC (RULES) ---`, bulleted)
//!
//! A block is omitted when its collection is empty. The system instruction
//! substitutes a short placeholder sentence for each omitted block.

use slm_core::constants::CITATION_SEPARATOR;
use slm_core::documents::Document;
use slm_core::messages::{Message, Role};

use crate::request::{GenerationRequest, RequestContent};

const DOCUMENTS_HEADER: &str = "--- SOURCE DOCUMENTS FOR CITATION ---";
const DISTILL_DOCUMENTS_HEADER: &str = "--- SOURCE DOCUMENTS ---";
const RULES_HEADER: &str = "--- YOUR LOGIC (RULES) ---";
const RECORD_SEPARATOR: &str = "\n\n---\n";

const NO_DOCUMENTS: &str = "No source documents provided.";
const NO_RULES: &str = "You have no logic (rules) defined yet.";
const NO_DOCUMENTS_FOR_DISTILL: &str = "No source documents were provided.";

fn render_records(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| format!("File Name: {}\nContent:\n{}", d.file_name, d.content))
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR)
}

/// Document block, or `None` when there are no documents.
pub fn documents_block(documents: &[Document]) -> Option<String> {
    if documents.is_empty() {
        return None;
    }
    Some(format!("{DOCUMENTS_HEADER}\n\n{}", render_records(documents)))
}

/// Rule block as a bulleted list, or `None` when there are no rules.
pub fn rules_block(rules: &[String]) -> Option<String> {
    if rules.is_empty() {
        return None;
    }
    Some(format!("{RULES_HEADER}\n- {}", rules.join("\n- ")))
}

/// Full system instruction: fixed preamble, then both grounding blocks (or
/// their placeholders).
pub fn system_instruction(documents: &[Document], rules: &[String]) -> String {
    let docs = documents_block(documents).unwrap_or_else(|| NO_DOCUMENTS.to_string());
    let logic = rules_block(rules).unwrap_or_else(|| NO_RULES.to_string());
    format!(
        "You are a helpful AI assistant called Social Listening LM. Your goal is to have a flexible, ongoing conversation.

**CONTEXT:**
You have been provided with two types of information:
1.  **Source Documents:** These are static files. When you use information from these, you MUST ground your answer in them and provide a direct quote as a citation.
2.  **Your Logic (Rules):** This is a list of rules and context from previous conversations that acts as a \"save state\" or your core logic.

**YOUR TASK:**
Continue the conversation naturally, following the rules in your logic. The user's latest message is the most current source of truth.

**RULES & RESPONSE FORMAT:**
-   **Accept Updates:** If the user provides new information or corrections, even when it contradicts your logic or the source documents, accept it and incorporate it without arguing.
-   **Prioritize the Conversation:** The live chat is the most important context.
-   **Cite Sources, Not Logic:** Provide citations ONLY for information taken directly from the \"Source Documents\".
-   **Response Format:**
    1.  **Answer:** Provide the complete answer to the user's query in Markdown.
    2.  **Citations:** After the answer, if you used source documents, add a separator line: '{CITATION_SEPARATOR}'. Below it, provide a single, valid JSON array of citation objects. Each object must have \"fileName\" and \"quote\" keys. Do not add any text after the JSON array. If no citations are used, do not include the separator or the JSON array.

Here is your context:
{docs}

{logic}
"
    )
}

/// Map stored history 1:1 into request entries, preserving roles and part
/// order.
pub fn map_history(messages: &[Message]) -> Vec<RequestContent> {
    messages
        .iter()
        .map(|m| RequestContent {
            role: m.role,
            parts: m.parts.clone(),
        })
        .collect()
}

/// Compose the request for one send.
pub fn build_generation_request(
    messages: &[Message],
    documents: &[Document],
    rules: &[String],
) -> GenerationRequest {
    GenerationRequest {
        system_instruction: system_instruction(documents, rules),
        contents: map_history(messages),
    }
}

/// Text-only transcript, one `User: "..."` / `AI: "..."` line per message.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let prefix = match m.role {
                Role::Model => "AI",
                Role::User => "User",
            };
            format!("{prefix}: \"{}\"", m.text_content())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for one generalized rule distilled from the conversation.
///
/// Callers reject empty history before getting here.
pub fn build_distillation_prompt(messages: &[Message], documents: &[Document]) -> String {
    let docs = if documents.is_empty() {
        NO_DOCUMENTS_FOR_DISTILL.to_string()
    } else {
        format!("{DISTILL_DOCUMENTS_HEADER}\n\n{}", render_records(documents))
    };
    let history = render_transcript(messages);
    format!(
        "Analyze the following conversation history and source documents. The user's final message often contains a correction or instruction. Distill the core learning from this entire interaction into a single, concise, and generalized rule for the AI to remember. The rule must be context-independent and written as a clear instruction.

**Source Documents:**
{docs}

**Conversation History:**
{history}

**Generated Rule:**"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
