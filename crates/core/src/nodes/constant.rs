//! Constant node: outputs a user-configured constant value with a dynamic
//! output port type (Int, Float, Str, Bool, Path). The value is stored as a
//! string and parsed at execute time.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use crate::node::{ExecutionContext, Node, PortDefinition};
use crate::types::{PortData, PortType};

pub struct ConstantNode {
    output_type: PortType,
}

impl ConstantNode {
    pub fn new() -> Self {
        Self {
            output_type: PortType::Int,
        }
    }

    pub fn from_params(params: &HashMap<String, serde_json::Value>) -> Result<Self> {
        let output_type = parse_param_type(params)?.unwrap_or(PortType::Int);
        Ok(Self { output_type })
    }
}

impl Default for ConstantNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for ConstantNode {
    fn node_type(&self) -> &str {
        "Constant"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition {
                name: "type".to_string(),
                port_type: PortType::Str,
                required: false,
                default_value: Some(serde_json::json!(port_type_name(&self.output_type))),
            },
            PortDefinition {
                name: "value".to_string(),
                port_type: PortType::Str,
                required: false,
                default_value: Some(serde_json::json!("0")),
            },
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition {
            name: "value".to_string(),
            port_type: self.output_type.clone(),
            required: true,
            default_value: None,
        }]
    }

    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        _ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>> {
        self.output_type = match inputs.get("type") {
            Some(PortData::Str(raw)) => parse_supported_type(raw)?,
            Some(other) => bail!("Constant: input 'type' must be Str, got {}", other.kind()),
            None => self.output_type.clone(),
        };

        let value_str = match inputs.get("value") {
            Some(PortData::Str(s)) => s.clone(),
            _ => "0".to_string(),
        };

        let port_data = match self.output_type {
            PortType::Int => {
                let v: i64 = value_str
                    .parse()
                    .map_err(|e| anyhow!("failed to parse '{value_str}' as Int: {e}"))?;
                PortData::Int(v)
            }
            PortType::Float => {
                let v: f64 = value_str
                    .parse()
                    .map_err(|e| anyhow!("failed to parse '{value_str}' as Float: {e}"))?;
                PortData::Float(v)
            }
            PortType::Str => PortData::Str(value_str),
            PortType::Bool => PortData::Bool(value_str == "true"),
            PortType::Path => PortData::Path(PathBuf::from(value_str)),
            PortType::Frames => bail!("unsupported constant output type: Frames"),
        };

        let mut outputs = HashMap::new();
        outputs.insert("value".to_string(), port_data);
        Ok(outputs)
    }
}

fn parse_param_type(params: &HashMap<String, serde_json::Value>) -> Result<Option<PortType>> {
    let Some(value) = params.get("type") else {
        return Ok(None);
    };

    let raw = value.as_str().ok_or_else(|| {
        anyhow!("Constant: param 'type' must be a string type name (Int|Float|Str|Bool|Path)")
    })?;

    Ok(Some(parse_supported_type(raw)?))
}

fn parse_supported_type(raw: &str) -> Result<PortType> {
    match raw {
        "Int" => Ok(PortType::Int),
        "Float" => Ok(PortType::Float),
        "Str" => Ok(PortType::Str),
        "Bool" => Ok(PortType::Bool),
        "Path" => Ok(PortType::Path),
        other => {
            bail!("Constant: unsupported type '{other}', expected one of Int|Float|Str|Bool|Path")
        }
    }
}

fn port_type_name(port_type: &PortType) -> &'static str {
    match port_type {
        PortType::Frames => "Frames",
        PortType::Int => "Int",
        PortType::Float => "Float",
        PortType::Str => "Str",
        PortType::Bool => "Bool",
        PortType::Path => "Path",
    }
}
