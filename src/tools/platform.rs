//! Platform Resolver
//!
//! Maps a command's logical name to the shell template for the host platform.
//! Known names come from a fixed table of Windows/POSIX template pairs; any
//! other name passes its catalog template through unchanged.

use crate::catalog::CommandDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform class driving template selection, shell choice and output decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// cmd.exe semantics, console output in the legacy code page
    Windows,

    /// sh semantics, UTF-8 console output
    Posix,
}

impl Platform {
    /// Platform of the running binary
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    /// Program and flag used to run a whole command line through the shell
    pub fn shell(&self) -> (&'static str, &'static str) {
        match self {
            Platform::Windows => ("cmd", "/C"),
            Platform::Posix => ("sh", "-c"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Posix => write!(f, "posix"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win32" => Ok(Platform::Windows),
            "posix" | "unix" | "linux" | "macos" => Ok(Platform::Posix),
            other => Err(format!(
                "Unknown platform '{}'. Must be one of: windows, posix",
                other
            )),
        }
    }
}

/// Template pair for one known command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTemplates {
    pub windows: &'static str,
    pub posix: &'static str,
}

impl PlatformTemplates {
    /// Template for the given platform
    pub fn for_platform(&self, platform: Platform) -> &'static str {
        match platform {
            Platform::Windows => self.windows,
            Platform::Posix => self.posix,
        }
    }
}

/// Built-in commands with a platform-specific variant
const TEMPLATE_TABLE: &[(&str, PlatformTemplates)] = &[
    ("查看当前路径", PlatformTemplates { windows: "echo %cd%", posix: "pwd" }),
    ("列出文件", PlatformTemplates { windows: "dir", posix: "ls -la" }),
    ("创建目录", PlatformTemplates { windows: "mkdir {{dirName}}", posix: "mkdir -p {{dirName}}" }),
    ("删除文件", PlatformTemplates { windows: "del {{fileName}}", posix: "rm {{fileName}}" }),
    (
        "复制文件",
        PlatformTemplates {
            windows: "copy {{source}} {{destination}}",
            posix: "cp {{source}} {{destination}}",
        },
    ),
    (
        "移动文件",
        PlatformTemplates {
            windows: "move {{source}} {{destination}}",
            posix: "mv {{source}} {{destination}}",
        },
    ),
    ("查看系统信息", PlatformTemplates { windows: "systeminfo", posix: "uname -a && lsb_release -a" }),
    (
        "查看磁盘空间",
        PlatformTemplates { windows: "wmic logicaldisk get size,freespace,caption", posix: "df -h" },
    ),
    ("查看进程", PlatformTemplates { windows: "tasklist", posix: "ps aux" }),
    (
        "结束进程",
        PlatformTemplates {
            windows: "taskkill /F /IM {{processName}}",
            posix: "pkill {{processName}}",
        },
    ),
    ("查看网络连接", PlatformTemplates { windows: "netstat -ano", posix: "netstat -tuln" }),
    ("ping", PlatformTemplates { windows: "ping -n 4 {{host}}", posix: "ping -c 4 {{host}}" }),
    ("查看IP地址", PlatformTemplates { windows: "ipconfig", posix: "ip addr show" }),
    (
        "重启服务",
        PlatformTemplates {
            windows: "net stop {{serviceName}} && net start {{serviceName}}",
            posix: "systemctl restart {{serviceName}}",
        },
    ),
    ("查看日志", PlatformTemplates { windows: "type {{logFile}}", posix: "cat {{logFile}}" }),
    (
        "压缩文件",
        PlatformTemplates {
            windows: "powershell Compress-Archive -Path {{source}} -DestinationPath {{destination}}",
            posix: "tar -czvf {{destination}} {{source}}",
        },
    ),
    (
        "解压文件",
        PlatformTemplates {
            windows: "powershell Expand-Archive -Path {{source}} -DestinationPath {{destination}}",
            posix: "tar -xzvf {{source}} -C {{destination}}",
        },
    ),
    (
        "查找文件",
        PlatformTemplates { windows: "dir /s /b {{fileName}}", posix: "find . -name {{fileName}}" },
    ),
    ("查看文件内容", PlatformTemplates { windows: "type {{fileName}}", posix: "cat {{fileName}}" }),
    ("编辑文件", PlatformTemplates { windows: "notepad {{fileName}}", posix: "nano {{fileName}}" }),
    ("重启系统", PlatformTemplates { windows: "shutdown /r /t 0", posix: "sudo reboot" }),
];

/// Look up the template pair registered for a command name
pub fn known_templates(name: &str) -> Option<&'static PlatformTemplates> {
    TEMPLATE_TABLE
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, templates)| templates)
}

/// Names that have a platform-specific variant
pub fn known_names() -> impl Iterator<Item = &'static str> {
    TEMPLATE_TABLE.iter().map(|(name, _)| *name)
}

/// Resolve the shell template for a definition on the given platform
///
/// Unknown names return `definition.raw_template` unchanged.
pub fn resolve_template(definition: &CommandDefinition, platform: Platform) -> String {
    match known_templates(&definition.name) {
        Some(templates) => templates.for_platform(platform).to_string(),
        None => definition.raw_template.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, raw: &str) -> CommandDefinition {
        CommandDefinition::new(name, raw)
    }

    #[test]
    fn test_list_files_resolves_per_platform() {
        let def = definition("列出文件", "ignored");
        assert_eq!(resolve_template(&def, Platform::Posix), "ls -la");
        assert_eq!(resolve_template(&def, Platform::Windows), "dir");
    }

    #[test]
    fn test_ping_embeds_host_placeholder() {
        let def = definition("ping", "ping {{host}}");
        assert_eq!(resolve_template(&def, Platform::Posix), "ping -c 4 {{host}}");
        assert_eq!(resolve_template(&def, Platform::Windows), "ping -n 4 {{host}}");
    }

    #[test]
    fn test_unknown_name_passes_through() {
        let def = definition("say打招呼", "echo {{name}}");
        assert_eq!(resolve_template(&def, Platform::Posix), "echo {{name}}");
        assert_eq!(resolve_template(&def, Platform::Windows), "echo {{name}}");
    }

    #[test]
    fn test_lookup_is_exact_match() {
        assert!(known_templates("列出文件").is_some());
        assert!(known_templates("列出文件 ").is_none());
        assert!(known_templates("PING").is_none());
    }

    #[test]
    fn test_table_is_complete_and_unique() {
        let names: Vec<_> = known_names().collect();
        assert_eq!(names.len(), 21);
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len(), "duplicate entries in template table");
    }

    #[test]
    fn test_every_entry_resolves_deterministically() {
        for name in known_names() {
            let def = definition(name, "raw");
            for platform in [Platform::Windows, Platform::Posix] {
                let first = resolve_template(&def, platform);
                let second = resolve_template(&def, platform);
                assert_eq!(first, second);
                assert_ne!(first, "raw", "{} should not pass through", name);
            }
        }
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("POSIX".parse::<Platform>().unwrap(), Platform::Posix);
        assert_eq!("linux".parse::<Platform>().unwrap(), Platform::Posix);
        assert!("beos".parse::<Platform>().is_err());
    }

    #[test]
    fn test_shell_selection() {
        assert_eq!(Platform::Windows.shell(), ("cmd", "/C"));
        assert_eq!(Platform::Posix.shell(), ("sh", "-c"));
    }
}
