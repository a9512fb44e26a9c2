//! Built-in provisioners
//!
//! - `echo`: produces declared outputs from config, for dry wiring checks
//! - `command`: runs an external command and reads outputs from its stdout

use serde_json::{Map, Value, json};
use stackgraph::{Outputs, ProviderError, ProviderRegistry, Provisioner, ResolvedConfig, ResourceSpec};
use std::collections::{BTreeSet, HashMap};
use std::process::Command;

/// Registry with every built-in provisioner
///
/// The echo provisioner needs each resource's declared output keys, so the
/// stack's specs are passed in.
pub fn builtin_registry(specs: &[ResourceSpec]) -> ProviderRegistry {
    let declared = specs
        .iter()
        .map(|s| (s.name.clone(), s.outputs.clone()))
        .collect();
    ProviderRegistry::new()
        .with("echo", Echo::new(declared))
        .with("command", CommandProvisioner)
}

// ============================================================================
// Echo
// ============================================================================

/// Returns `config.outputs.<key>` for each declared key, or `"<name>.<key>"`
pub struct Echo {
    declared: HashMap<String, BTreeSet<String>>,
}

impl Echo {
    pub fn new(declared: HashMap<String, BTreeSet<String>>) -> Self {
        Self { declared }
    }
}

impl Provisioner for Echo {
    fn apply(&self, name: &str, config: &ResolvedConfig) -> Result<Outputs, ProviderError> {
        let canned = config.config.get("outputs").and_then(Value::as_object);
        let keys = self.declared.get(name).cloned().unwrap_or_default();

        let outputs = keys
            .into_iter()
            .map(|key| {
                let value = canned
                    .and_then(|c| c.get(&key))
                    .cloned()
                    .unwrap_or_else(|| json!(format!("{name}.{key}")));
                (key, value)
            })
            .collect();
        Ok(outputs)
    }
}

// ============================================================================
// Command
// ============================================================================

/// Runs `config.command` with `config.args`
///
/// Inputs are exported as `STACKPLAN_INPUT_<NAME>` and the resolved config as
/// `STACKPLAN_CONFIG`. Stdout must be a JSON object of outputs. A non-zero
/// exit is retryable when its code is listed in `config.retry_on`.
pub struct CommandProvisioner;

impl Provisioner for CommandProvisioner {
    fn apply(&self, name: &str, config: &ResolvedConfig) -> Result<Outputs, ProviderError> {
        let program = config
            .config
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::fatal(format!("{name}: config.command is required")))?;

        let args: Vec<String> = match config.config.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(value_as_arg).collect(),
            Some(_) => {
                return Err(ProviderError::fatal(format!(
                    "{name}: config.args must be an array"
                )));
            }
        };

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .env("STACKPLAN_RESOURCE", name)
            .env("STACKPLAN_CONFIG", config.config.to_string());
        for (key, value) in &config.inputs {
            cmd.env(input_env_var(key), value_as_arg(value));
        }

        log::debug!("{name}: running {program} {}", args.join(" "));
        let output = cmd
            .output()
            .map_err(|e| ProviderError::fatal(format!("{name}: failed to execute {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code();
            let retryable = code.is_some_and(|c| retry_codes(&config.config).contains(&c));
            return Err(ProviderError::new(
                format!(
                    "{name}: {program} exited with {}: {}",
                    code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    stderr.trim()
                ),
                retryable,
            ));
        }

        parse_outputs(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| ProviderError::fatal(format!("{name}: {e}")))
    }
}

/// Parse command stdout as a JSON object; empty output means no outputs
fn parse_outputs(stdout: &str) -> Result<Outputs, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Outputs::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(object_to_outputs(map)),
        Ok(_) => Err("stdout must be a JSON object".to_string()),
        Err(e) => Err(format!("stdout is not valid JSON: {e}")),
    }
}

fn object_to_outputs(map: Map<String, Value>) -> Outputs {
    map.into_iter().collect()
}

fn retry_codes(config: &Value) -> Vec<i32> {
    config
        .get("retry_on")
        .and_then(Value::as_array)
        .map(|codes| {
            codes
                .iter()
                .filter_map(Value::as_i64)
                .filter_map(|c| i32::try_from(c).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn input_env_var(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("STACKPLAN_INPUT_{sanitized}")
}

fn value_as_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn resolved(name: &str, provider: &str, config: Value) -> ResolvedConfig {
        ResolvedConfig {
            name: name.into(),
            provider: provider.into(),
            inputs: BTreeMap::new(),
            config,
        }
    }

    #[test]
    fn test_echo_uses_canned_outputs_then_defaults() {
        let specs = vec![
            ResourceSpec::new("network", "echo")
                .output("cf_arn")
                .output("cf_domain"),
        ];
        let registry = builtin_registry(&specs);

        let config = resolved(
            "network",
            "echo",
            json!({"outputs": {"cf_domain": "d111.cloudfront.net"}}),
        );
        let outputs = registry.apply("network", &config).unwrap();

        assert_eq!(outputs["cf_domain"], "d111.cloudfront.net");
        assert_eq!(outputs["cf_arn"], "network.cf_arn");
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_command_requires_command() {
        let err = CommandProvisioner
            .apply("site", &resolved("site", "command", json!({})))
            .unwrap_err();
        assert!(!err.retryable);
        assert!(err.message.contains("config.command"));
    }

    #[test]
    fn test_command_rejects_non_array_args() {
        let err = CommandProvisioner
            .apply(
                "site",
                &resolved("site", "command", json!({"command": "true", "args": "x"})),
            )
            .unwrap_err();
        assert!(err.message.contains("array"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_reads_json_outputs_and_inputs() {
        let mut config = resolved(
            "dns",
            "command",
            json!({
                "command": "sh",
                "args": ["-c", "printf '{\"record_id\":\"%s\"}' \"$STACKPLAN_INPUT_DOMAIN\""],
            }),
        );
        config
            .inputs
            .insert("domain".into(), json!("d111.cloudfront.net"));

        let outputs = CommandProvisioner.apply("dns", &config).unwrap();
        assert_eq!(outputs["record_id"], "d111.cloudfront.net");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exit_code_retryable() {
        let config = resolved(
            "dns",
            "command",
            json!({"command": "sh", "args": ["-c", "exit 75"], "retry_on": [75]}),
        );
        let err = CommandProvisioner.apply("dns", &config).unwrap_err();
        assert!(err.retryable);

        let config = resolved("dns", "command", json!({"command": "sh", "args": ["-c", "exit 1"]}));
        let err = CommandProvisioner.apply("dns", &config).unwrap_err();
        assert!(!err.retryable);
    }

    #[test]
    fn test_parse_outputs() {
        assert!(parse_outputs("  \n").unwrap().is_empty());
        assert_eq!(parse_outputs(r#"{"a": 1}"#).unwrap()["a"], 1);
        assert!(parse_outputs("[1, 2]").is_err());
        assert!(parse_outputs("not json").is_err());
    }

    #[test]
    fn test_input_env_var() {
        assert_eq!(input_env_var("cf-domain"), "STACKPLAN_INPUT_CF_DOMAIN");
    }
}
