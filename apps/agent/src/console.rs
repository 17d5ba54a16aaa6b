//! # Operator Console
//!
//! Line-oriented command interface over stdin/stdout, standing in for the
//! station UI. One command per line; responses are JSON on stdout so a
//! front end (or a human with a terminal) can drive every controller
//! operation.
//!
//! ```text
//! refs <customers|products|operators|vehicles>
//! lookup <plate>
//! weigh
//! unlock <username> <password>
//! lock
//! create <draft-json>
//! close <id> <update-json>
//! print <id>
//! status
//! ```

use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::controller::Controller;
use crate::error::AgentError;
use scalehouse_core::ReferenceKind;

/// Reads commands from stdin until EOF.
pub async fn run(controller: Arc<Controller>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(command = line, "Console command");

        let response = dispatch(&controller, line).await;
        match response {
            Ok(value) => println!("{}", json!({ "ok": true, "result": value })),
            Err(AgentError::Validation(messages)) => {
                println!("{}", json!({ "ok": false, "validation": messages }))
            }
            Err(e) => println!("{}", json!({ "ok": false, "error": e.to_string() })),
        }
    }
}

async fn dispatch(controller: &Controller, line: &str) -> Result<serde_json::Value, AgentError> {
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        "refs" => {
            let kind = parse_kind(rest)?;
            let names = controller.list_reference(kind).await?;
            Ok(json!(names))
        }
        "lookup" => {
            let transaction = controller.lookup_by_vehicle(rest).await?;
            Ok(json!(transaction))
        }
        "weigh" => {
            let reading = controller.current_reading();
            Ok(json!(reading))
        }
        "unlock" => {
            let (username, password) = rest.split_once(' ').unwrap_or((rest, ""));
            let outcome = controller
                .validate_credentials(username.trim(), password.trim())
                .await?;
            Ok(json!({ "unlocked": outcome.unlocked, "message": outcome.message }))
        }
        "lock" => {
            controller.lock_form().await?;
            Ok(json!("locked"))
        }
        "create" => {
            let draft = serde_json::from_str(rest)
                .map_err(|e| AgentError::Validation(vec![format!("bad draft: {e}")]))?;
            let transaction = controller.create_transaction(&draft).await?;
            Ok(json!(transaction))
        }
        "close" => {
            let (id, body) = rest.split_once(' ').unwrap_or((rest, "{}"));
            let id: i64 = id
                .trim()
                .parse()
                .map_err(|_| AgentError::Validation(vec!["bad transaction id".to_string()]))?;
            let update = serde_json::from_str(body.trim())
                .map_err(|e| AgentError::Validation(vec![format!("bad update: {e}")]))?;
            let (transaction, totals) = controller.update_transaction(id, &update).await?;
            Ok(json!({ "transaction": transaction, "totals": totals }))
        }
        "print" => {
            let id: i64 = rest
                .parse()
                .map_err(|_| AgentError::Validation(vec!["bad transaction id".to_string()]))?;
            controller.record_print(id).await?;
            Ok(json!("printed"))
        }
        "status" => {
            let status = controller.connectivity_status().await?;
            Ok(json!(status))
        }
        other => Err(AgentError::Validation(vec![format!(
            "unknown command '{other}'"
        )])),
    }
}

fn parse_kind(name: &str) -> Result<ReferenceKind, AgentError> {
    match name {
        "customers" => Ok(ReferenceKind::Customer),
        "products" => Ok(ReferenceKind::Product),
        "operators" => Ok(ReferenceKind::Operator),
        "vehicles" => Ok(ReferenceKind::Vehicle),
        other => Err(AgentError::Validation(vec![format!(
            "unknown reference kind '{other}'"
        )])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(parse_kind("vehicles").unwrap(), ReferenceKind::Vehicle);
        assert!(parse_kind("drivers").is_err());
    }
}
