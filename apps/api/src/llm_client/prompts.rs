// Shared system instructions. Each module that needs LLM calls defines its own
// prompt templates alongside it; this file holds the cross-cutting fragments.

/// System instruction that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System instruction for writing outreach copy.
pub const OUTREACH_WRITER_SYSTEM: &str = "You write short, specific, personable outreach \
    messages. Reply with the message text only: no preamble, no commentary, \
    no markdown code fences.";
