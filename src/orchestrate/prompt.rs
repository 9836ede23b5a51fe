// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! System prompts given to sub-agent sessions.

/// Reply that suppresses the announcement.
pub const ANNOUNCE_SKIP: &str = "ANNOUNCE_SKIP";

/// Message sent to the child session for the announce step.
pub const ANNOUNCE_STEP_MESSAGE: &str = "Sub-agent announce step.";

/// Context for the child's primary run.
pub struct SubagentPromptContext<'a> {
    pub label: Option<&'a str>,
    pub requester_session_key: Option<&'a str>,
    pub requester_provider: Option<&'a str>,
    pub child_session_key: &'a str,
}

/// Extra system prompt for the child's primary run.
pub fn build_subagent_system_prompt(ctx: &SubagentPromptContext<'_>) -> String {
    let mut lines = vec!["Sub-agent context:".to_string()];
    if let Some(label) = ctx.label.filter(|l| !l.trim().is_empty()) {
        lines.push(format!("Label: {}", label.trim()));
    }
    if let Some(key) = ctx.requester_session_key {
        lines.push(format!("Requester session: {}.", key));
    }
    if let Some(provider) = ctx.requester_provider {
        lines.push(format!("Requester provider: {}.", provider));
    }
    lines.push(format!("Your session: {}.", ctx.child_session_key));
    lines.push("Run the task. Provide a clear final answer (plain text).".to_string());
    lines.push(
        "After you finish, you may be asked to produce an \"announce\" message to post back to the requester chat."
            .to_string(),
    );
    lines.join("\n")
}

/// Context for the announce step.
pub struct AnnouncePromptContext<'a> {
    pub requester_session_key: &'a str,
    pub requester_provider: Option<&'a str>,
    pub announce_provider: &'a str,
    pub task: &'a str,
    pub sub_agent_reply: Option<&'a str>,
}

/// Extra system prompt for the announce step.
pub fn build_announce_prompt(ctx: &AnnouncePromptContext<'_>) -> String {
    let mut lines = vec![
        "Sub-agent announce step:".to_string(),
        format!("Requester session: {}.", ctx.requester_session_key),
    ];
    if let Some(provider) = ctx.requester_provider {
        lines.push(format!("Requester provider: {}.", provider));
    }
    lines.push(format!("Post target provider: {}.", ctx.announce_provider));
    lines.push(format!("Original task: {}", ctx.task));

    match ctx.sub_agent_reply {
        Some(reply) => lines.push(format!("Sub-agent result: {}", reply)),
        None => lines.push("Sub-agent result: (not available).".to_string()),
    }

    lines.push(format!("Reply exactly \"{}\" to stay silent.", ANNOUNCE_SKIP));
    lines.push("Any other reply will be posted to the requester chat provider.".to_string());
    lines.join("\n")
}

/// Whether an announce-step reply means "stay silent".
pub fn is_announce_skip(reply: &str) -> bool {
    reply.trim() == ANNOUNCE_SKIP
}
