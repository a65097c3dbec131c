//! Minimal MCP server over stdio, used as a test fixture.
//!
//! Speaks just enough JSON-RPC for the handshake and tool calls, with
//! behavior switches via environment variables:
//!
//! - `STUB_SERVER_NAME`: serverInfo name reported at initialize (default "stub")
//! - `STUB_TOOL_NAME`:   name of the primary tool (default "ping")
//! - `STUB_REPLY`:       text returned by the primary tool (default "pong")
//! - `STUB_MUTE_CALLS`:  when "1", never answer `tools/call` (timeout tests)
//! - `STUB_GARBAGE`:     when "1", print a non-JSON line and an unsolicited
//!                       notification before each response

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, Write};

use serde_json::{json, Value};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn reply(out: &mut impl Write, id: &Value, result: Value) {
    let msg = json!({ "jsonrpc": "2.0", "id": id, "result": result });
    writeln!(out, "{msg}").unwrap();
    out.flush().unwrap();
}

fn reply_error(out: &mut impl Write, id: &Value, code: i64, message: &str) {
    let msg = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    });
    writeln!(out, "{msg}").unwrap();
    out.flush().unwrap();
}

fn main() {
    let server_name = env_or("STUB_SERVER_NAME", "stub");
    let tool_name = env_or("STUB_TOOL_NAME", "ping");
    let tool_reply = env_or("STUB_REPLY", "pong");
    let mute_calls = env_or("STUB_MUTE_CALLS", "0") == "1";
    let garbage = env_or("STUB_GARBAGE", "0") == "1";

    eprintln!("mcp-stub-server '{server_name}' starting");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let method = msg.get("method").and_then(Value::as_str).unwrap_or("");
        let id = msg.get("id").cloned();

        let Some(id) = id else {
            // Notification; nothing to answer.
            continue;
        };

        if garbage {
            writeln!(stdout, "this is not json").unwrap();
            let notif = json!({
                "jsonrpc": "2.0",
                "method": "notifications/message",
                "params": { "level": "info", "data": "noise" }
            });
            writeln!(stdout, "{notif}").unwrap();
            stdout.flush().unwrap();
        }

        match method {
            "initialize" => reply(
                &mut stdout,
                &id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": server_name, "version": "0.1.0" }
                }),
            ),
            "tools/list" => reply(
                &mut stdout,
                &id,
                json!({
                    "tools": [
                        {
                            "name": tool_name,
                            "description": format!("Reply with {tool_reply}"),
                            "inputSchema": { "type": "object", "properties": {} }
                        },
                        {
                            "name": "echo_env",
                            "description": "Return the value of the STUB_ECHO_ENV variable",
                            "inputSchema": { "type": "object", "properties": {} }
                        }
                    ]
                }),
            ),
            "tools/call" => {
                if mute_calls {
                    // Swallow the request on purpose.
                    continue;
                }
                let name = msg
                    .pointer("/params/name")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if name == tool_name {
                    reply(
                        &mut stdout,
                        &id,
                        json!({ "content": [{ "type": "text", "text": tool_reply }] }),
                    );
                } else if name == "echo_env" {
                    let value = env_or("STUB_ECHO_ENV", "");
                    reply(
                        &mut stdout,
                        &id,
                        json!({ "content": [{ "type": "text", "text": value }] }),
                    );
                } else {
                    reply_error(&mut stdout, &id, -32602, &format!("unknown tool: {name}"));
                }
            }
            other => reply_error(&mut stdout, &id, -32601, &format!("unknown method: {other}")),
        }
    }
}
