//! Catalog data types
//!
//! Field names follow the `commands.yaml` layout: a definition's template is
//! stored under `command`, its parameter list under `params`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of value a parameter accepts
///
/// Values are substituted as raw text either way; the kind is display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    #[serde(alias = "string")]
    Text,
    Number,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Text => write!(f, "text"),
            ParamKind::Number => write!(f, "number"),
        }
    }
}

impl std::str::FromStr for ParamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Ok(ParamKind::Text),
            "number" => Ok(ParamKind::Number),
            other => Err(format!("Unknown parameter type '{}'", other)),
        }
    }
}

/// One named `{{placeholder}}` a command expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: ParamKind,

    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
        }
    }

    /// The literal token this parameter fills, e.g. `{{fileName}}`
    pub fn token(&self) -> String {
        format!("{{{{{}}}}}", self.name)
    }
}

/// A named command as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Unique key
    pub name: String,

    /// Shell template used when no platform-specific variant exists
    #[serde(rename = "command")]
    pub raw_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,

    #[serde(rename = "params", default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSpec>,
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, raw_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_template: raw_template.into(),
            icon: None,
            emoji: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParameterSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_layout() {
        let yaml = r#"
name: 备份脚本
command: backupScript.bat --folder {{folderName}}
icon: SaveIcon
emoji: "💾"
params:
  - name: folderName
    type: string
    required: true
  - name: depth
    type: number
"#;
        let def: CommandDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.name, "备份脚本");
        assert_eq!(def.raw_template, "backupScript.bat --folder {{folderName}}");
        assert_eq!(def.icon.as_deref(), Some("SaveIcon"));
        assert_eq!(def.parameters.len(), 2);
        assert_eq!(def.parameters[0].kind, ParamKind::Text);
        assert!(def.parameters[0].required);
        assert_eq!(def.parameters[1].kind, ParamKind::Number);
        assert!(!def.parameters[1].required);
    }

    #[test]
    fn test_minimal_definition() {
        let def: CommandDefinition = serde_yaml::from_str("name: ls\ncommand: ls -la\n").unwrap();
        assert!(def.parameters.is_empty());
        assert!(def.icon.is_none());
    }

    #[test]
    fn test_token() {
        let spec = ParameterSpec::new("fileName", ParamKind::Text, true);
        assert_eq!(spec.token(), "{{fileName}}");
    }

    #[test]
    fn test_param_kind_parsing() {
        assert_eq!("string".parse::<ParamKind>().unwrap(), ParamKind::Text);
        assert_eq!("Number".parse::<ParamKind>().unwrap(), ParamKind::Number);
        assert!("date".parse::<ParamKind>().is_err());
    }
}
