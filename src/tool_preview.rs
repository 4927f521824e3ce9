use serde_json::Value;

use crate::edit_diff::{format_unified_diff, DEFAULT_DIFF_CONTEXT_LINES};

const MAX_ARG_PREVIEW_CHARS: usize = 120;

/// Header for a tool block, derived from the tool name and its arguments at
/// `tool_start` time. One canonical format per tool shape.
pub fn tool_header(tool_name: &str, args: &Value) -> String {
    match tool_name {
        "bash" | "shell" | "run_command" => {
            let command = str_arg(args, "command").unwrap_or("<missing>");
            format!("[{tool_name}] $ {command}")
        }
        "write_file" | "write" | "create_file" => {
            let path = str_arg(args, "path").unwrap_or("<missing>");
            let content = str_arg(args, "content").unwrap_or("");
            let (chars, lines) = content_stats(content);
            format!("[{tool_name}] {path} ({chars} chars, {lines} lines)")
        }
        "edit_file" | "edit" => {
            let path = str_arg(args, "path").unwrap_or("<missing>");
            let old_str = str_arg(args, "old_str").unwrap_or("");
            let new_str = str_arg(args, "new_str").unwrap_or("");
            let diff = format_unified_diff(old_str, new_str, DEFAULT_DIFF_CONTEXT_LINES);
            format!("[{tool_name}] {path}\n{}", diff.trim_end())
        }
        "read_file" | "read" => {
            let path = str_arg(args, "path").unwrap_or("<missing>");
            format!("[{tool_name}] {path}")
        }
        "search_files" | "search" | "grep" => {
            let query = str_arg(args, "query")
                .or_else(|| str_arg(args, "pattern"))
                .unwrap_or("<missing>");
            format!("[{tool_name}] ? {query}")
        }
        "list_files" | "list_directory" => {
            let path = str_arg(args, "path").unwrap_or(".");
            format!("[{tool_name}] {path}")
        }
        _ => format!("[{tool_name}] {}", compact_args(args)),
    }
}

/// Trailing status marker appended when the tool finishes.
pub fn tool_status_marker(tool_name: &str, is_error: bool) -> String {
    let status = if is_error { "error" } else { "done" };
    format!("[{tool_name}: {status}]")
}

pub fn content_stats(content: &str) -> (usize, usize) {
    (
        content.chars().count(),
        content
            .lines()
            .count()
            .max(usize::from(!content.is_empty())),
    )
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn compact_args(args: &Value) -> String {
    if args.as_object().is_some_and(|obj| obj.is_empty()) {
        return "(no arguments)".to_string();
    }
    let rendered = args.to_string();
    if rendered.chars().count() > MAX_ARG_PREVIEW_CHARS {
        let cut: String = rendered.chars().take(MAX_ARG_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        rendered
    }
}
