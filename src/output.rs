//! Human vs machine output for CLI commands

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Human }
    }

    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

/// Envelope written to stdout in JSON mode
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub ok: bool,
    pub command: &'a str,
    pub data: T,
}

pub fn render_success<T: Serialize>(command: &str, data: T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Envelope { ok: true, command, data })
}

/// Print `data` as a JSON envelope; no-op in human mode
pub fn emit_success<T: Serialize>(mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        println!("{}", render_success(command, data)?);
    }
    Ok(())
}

pub fn emit_error(mode: OutputMode, command: &str, message: &str) {
    match mode {
        OutputMode::Json => {
            let body = serde_json::json!({ "ok": false, "command": command, "error": message });
            println!("{}", body);
        }
        OutputMode::Human => crate::ui::error(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let rendered = render_success("stats", serde_json::json!({ "tables": 2 })).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value, serde_json::json!({ "ok": true, "command": "stats", "data": { "tables": 2 } }));
    }

    #[test]
    fn test_mode_from_flag() {
        assert!(OutputMode::from_flag(false).is_human());
        assert_eq!(OutputMode::from_flag(true), OutputMode::Json);
    }
}
