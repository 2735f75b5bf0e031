// config.rs — flat `key=value` configuration file parser (§6).
//
// Tolerant of blank lines and `#`-comments (a supplement: the source's own
// startup prompts take server IP/port from argv/stdin directly, so a
// comment-tolerant file format is a free addition on top, not a change to
// the required `key=value` shape). Unknown keys are logged via `log_dev`
// and ignored, per spec.

use std::net::Ipv4Addr;
use std::path::Path;

use crate::console::log_dev;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_ip: Ipv4Addr,
    pub server_udp_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(127, 0, 0, 1),
            server_udp_port: 9001,
        }
    }
}

pub fn parse_config(text: &str) -> Result<ServerConfig, ConfigError> {
    let mut cfg = ServerConfig::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError {
                line: Some(idx + 1),
                message: format!("expected key=value, found {line:?}"),
            });
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "serverIp" => {
                cfg.server_ip = value.parse().map_err(|_| ConfigError {
                    line: Some(idx + 1),
                    message: format!("invalid serverIp {value:?}"),
                })?;
            }
            "serverUdpPort" => {
                cfg.server_udp_port = value.parse().map_err(|_| ConfigError {
                    line: Some(idx + 1),
                    message: format!("invalid serverUdpPort {value:?}"),
                })?;
            }
            other => {
                log_dev(format!("config: ignoring unknown key {other:?} at line {}", idx + 1));
            }
        }
    }

    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError {
        line: None,
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let cfg = parse_config("serverIp=10.0.0.5\nserverUdpPort=9100\n").unwrap();
        assert_eq!(cfg.server_ip, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(cfg.server_udp_port, 9100);
    }

    #[test]
    fn ignores_comments_and_blank_lines_and_unknown_keys() {
        let cfg = parse_config("# comment\n\nserverUdpPort=7000\nfoo=bar\n").unwrap();
        assert_eq!(cfg.server_udp_port, 7000);
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(parse_config("not a key value line").is_err());
    }

    #[test]
    fn rejects_invalid_port() {
        let err = parse_config("serverUdpPort=notanumber").unwrap_err();
        assert_eq!(err.line, Some(1));
    }
}
