use serde::Deserialize;
use std::time::Duration;

/// Addresses, ports and feature switches for the OSC link.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OscConfig {
    #[serde(default = "d_host")]
    pub host: String,
    /// Port we listen on.
    #[serde(default = "d_receive_port")]
    pub receive_port: u16,
    /// Port the remote end listens on.
    #[serde(default = "d_send_port")]
    pub send_port: u16,
    #[serde(default = "d_true")]
    pub enable_position_tracking: bool,
    #[serde(default = "d_true")]
    pub enable_avatar_parameters: bool,
    #[serde(default = "d_parameter_prefix")]
    pub parameter_prefix: String,
    /// Seconds between `/user/<id>/position/request` sweeps.
    #[serde(default = "d_position_request_interval")]
    pub position_request_interval: f32,
    /// Id the observer is registered under in the engine.
    #[serde(default = "d_local_user_id")]
    pub local_user_id: String,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            receive_port: d_receive_port(),
            send_port: d_send_port(),
            enable_position_tracking: true,
            enable_avatar_parameters: true,
            parameter_prefix: d_parameter_prefix(),
            position_request_interval: d_position_request_interval(),
            local_user_id: d_local_user_id(),
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".to_string()
}
fn d_receive_port() -> u16 {
    9001
}
fn d_send_port() -> u16 {
    9000
}
fn d_true() -> bool {
    true
}
fn d_parameter_prefix() -> String {
    "/avatar/parameters/".to_string()
}
fn d_position_request_interval() -> f32 {
    0.1
}
fn d_local_user_id() -> String {
    "local".to_string()
}

impl OscConfig {
    pub fn receive_addr(&self) -> String {
        format!("{}:{}", self.host, self.receive_port)
    }

    pub fn send_addr(&self) -> String {
        format!("{}:{}", self.host, self.send_port)
    }

    pub fn position_request_interval(&self) -> Duration {
        let fallback = Duration::from_millis(100);
        if self.position_request_interval > 0.0 {
            Duration::try_from_secs_f32(self.position_request_interval).unwrap_or(fallback)
        } else {
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_usual_ports() {
        let cfg = OscConfig::default();
        assert_eq!(cfg.receive_addr(), "127.0.0.1:9001");
        assert_eq!(cfg.send_addr(), "127.0.0.1:9000");
        assert_eq!(cfg.position_request_interval(), Duration::from_secs_f32(0.1));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: OscConfig = toml::from_str(
            r#"
            send_port = 9100
            enable_avatar_parameters = false
            position_request_interval = -1.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.send_port, 9100);
        assert_eq!(cfg.receive_port, 9001);
        assert!(!cfg.enable_avatar_parameters);
        assert!(cfg.enable_position_tracking);
        assert_eq!(cfg.local_user_id, "local");
        assert_eq!(cfg.position_request_interval(), Duration::from_millis(100));
    }

    #[test]
    fn out_of_range_intervals_fall_back() {
        for secs in [1e30, f32::INFINITY, f32::NAN, 0.0] {
            let cfg = OscConfig {
                position_request_interval: secs,
                ..OscConfig::default()
            };
            assert_eq!(cfg.position_request_interval(), Duration::from_millis(100), "{}", secs);
        }
    }
}
