//! Value propagation - substitute applied outputs into a resource's inputs

use crate::error::{GraphError, Result};
use crate::state::StateLookup;
use crate::template;
use crate::types::{Reference, ResourceSpec};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A resource's configuration with every reference substituted
///
/// Built fresh for each apply and handed to the provisioner; never written
/// back onto the [`ResourceSpec`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub name: String,
    pub provider: String,
    /// Local input name -> resolved value
    pub inputs: BTreeMap<String, Value>,
    /// Payload with placeholders replaced
    pub config: Value,
}

impl ResolvedConfig {
    /// Resolved value of a named input
    pub fn input(&self, local: &str) -> Option<&Value> {
        self.inputs.get(local)
    }

    /// Resolved input as a string, if it is one
    pub fn input_str(&self, local: &str) -> Option<&str> {
        self.input(local).and_then(Value::as_str)
    }
}

/// Resolve all of `spec`'s references against `states`
///
/// Every referenced resource must be `Applied` and must have produced the
/// referenced key. Anything else is an [`GraphError::UnresolvedReference`],
/// which means the plan order was not respected.
pub fn resolve_inputs<S>(spec: &ResourceSpec, states: &S) -> Result<ResolvedConfig>
where
    S: StateLookup + ?Sized,
{
    let fetch = |reference: &Reference| {
        states
            .lookup(reference)
            .ok_or_else(|| GraphError::UnresolvedReference {
                resource: spec.name.clone(),
                reference: reference.clone(),
            })
    };

    let mut inputs = BTreeMap::new();
    for (local, reference) in &spec.inputs {
        inputs.insert(local.clone(), fetch(reference)?);
    }

    let config = template::render(&spec.config, &mut |text: &str| {
        let reference = Reference::parse(text).ok_or_else(|| GraphError::InvalidReference {
            resource: spec.name.clone(),
            text: text.to_string(),
        })?;
        fetch(&reference)
    })?;

    Ok(ResolvedConfig {
        name: spec.name.clone(),
        provider: spec.provider.clone(),
        inputs,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Outputs, ResourceState};
    use serde_json::json;
    use std::collections::HashMap;

    fn applied(pairs: &[(&str, Value)]) -> ResourceState {
        let outputs: Outputs = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        ResourceState::applied(outputs)
    }

    fn cloudflare() -> ResourceSpec {
        ResourceSpec::new("cloudflare", "cf")
            .output("record_id")
            .input("domain", "network", "cf_domain")
            .config(json!({
                "type": "CNAME",
                "content": "${network.cf_domain}",
                "comment": "fronted by ${network.cf_arn}",
            }))
    }

    #[test]
    fn test_resolve_substitutes_outputs() {
        let mut states = HashMap::new();
        states.insert(
            "network".to_string(),
            applied(&[
                ("cf_domain", json!("d111.cloudfront.net")),
                ("cf_arn", json!("arn:aws:cloudfront::1:distribution/E1")),
            ]),
        );

        let spec = cloudflare();
        let resolved = resolve_inputs(&spec, &states).unwrap();

        assert_eq!(resolved.input_str("domain"), Some("d111.cloudfront.net"));
        assert_eq!(resolved.config["content"], "d111.cloudfront.net");
        assert_eq!(
            resolved.config["comment"],
            "fronted by arn:aws:cloudfront::1:distribution/E1"
        );
        assert_eq!(resolved.config["type"], "CNAME");
        // Original declaration is untouched
        assert_eq!(spec.config["content"], "${network.cf_domain}");
    }

    #[test]
    fn test_resolve_fails_when_dependency_not_applied() {
        let mut states = HashMap::new();
        states.insert("network".to_string(), ResourceState::pending());

        let err = resolve_inputs(&cloudflare(), &states).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnresolvedReference {
                resource: "cloudflare".into(),
                reference: Reference::new("network", "cf_domain"),
            }
        );
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_resolve_fails_when_output_missing() {
        let mut states = HashMap::new();
        states.insert(
            "network".to_string(),
            applied(&[("cf_domain", json!("d111.cloudfront.net"))]),
        );

        let err = resolve_inputs(&cloudflare(), &states).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnresolvedReference {
                resource: "cloudflare".into(),
                reference: Reference::new("network", "cf_arn"),
            }
        );
    }

    #[test]
    fn test_resolve_without_references() {
        let spec = ResourceSpec::new("storage", "aws").config(json!({"bucket": "blog"}));
        let states: HashMap<String, ResourceState> = HashMap::new();

        let resolved = resolve_inputs(&spec, &states).unwrap();
        assert!(resolved.inputs.is_empty());
        assert_eq!(resolved.config, json!({"bucket": "blog"}));
    }
}
