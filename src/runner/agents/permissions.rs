//! Translation of task permissions into agent tool allowlists.

use crate::task::PermissionsConfig;

/// Tools granted by the `read` permission.
pub const READ_TOOLS: &[&str] = &["Read", "Glob", "Grep"];
/// Tools granted by the `write` permission.
pub const WRITE_TOOLS: &[&str] = &["Write", "Edit"];
/// Tools granted by the `bash` permission.
pub const BASH_TOOLS: &[&str] = &["Bash"];
/// Tools granted by the `web_fetch` permission.
pub const WEB_TOOLS: &[&str] = &["WebFetch", "WebSearch"];

/// Mode used when elevated permissions are granted without an explicit mode.
pub const AUTO_APPROVE_MODE: &str = "dontAsk";

/// Builds the tool allowlist. `force_web` grants web tools regardless of the task.
pub fn allowed_tools(perms: &PermissionsConfig, force_web: bool) -> Vec<&'static str> {
    let mut tools = Vec::new();
    if perms.read {
        tools.extend_from_slice(READ_TOOLS);
    }
    if perms.write {
        tools.extend_from_slice(WRITE_TOOLS);
    }
    if perms.bash {
        tools.extend_from_slice(BASH_TOOLS);
    }
    if perms.web_fetch || force_web {
        tools.extend_from_slice(WEB_TOOLS);
    }
    tools
}

/// Permission mode for the CLI: the explicit mode, else auto-approve when any
/// elevated permission is granted, else none (the agent's restrictive default).
pub fn permission_mode(perms: &PermissionsConfig) -> Option<&str> {
    match perms.mode.as_deref() {
        Some(mode) if !mode.is_empty() => Some(mode),
        _ if perms.is_elevated() => Some(AUTO_APPROVE_MODE),
        _ => None,
    }
}

/// Command-line flags for the CLI backend.
pub fn cli_flags(perms: &PermissionsConfig) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(mode) = permission_mode(perms) {
        flags.push("--permission-mode".to_string());
        flags.push(mode.to_string());
    }
    let tools = allowed_tools(perms, false);
    if !tools.is_empty() {
        flags.push("--allowedTools".to_string());
        flags.push(tools.join(","));
    }
    flags
}

/// Shell-like rendering of the flags, for logs.
pub fn describe_flags(flags: &[String]) -> String {
    flags
        .iter()
        .map(|f| {
            if f.contains(',') || f.contains(' ') {
                format!("'{}'", f)
            } else {
                f.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
