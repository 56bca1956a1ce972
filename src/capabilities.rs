use proxima_osc::OscConfig;

/// Optional subsystems, resolved once at startup. Callers branch on these instead of
/// probing the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub transport: bool,
    pub position_tracking: bool,
    pub avatar_parameters: bool,
}

impl Capabilities {
    pub fn resolve(osc: &OscConfig, transport_connected: bool) -> Self {
        Self {
            transport: transport_connected,
            position_tracking: transport_connected && osc.enable_position_tracking,
            avatar_parameters: transport_connected && osc.enable_avatar_parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_disables_everything() {
        let caps = Capabilities::resolve(&OscConfig::default(), false);
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn connected_follows_config_switches() {
        let osc = OscConfig {
            enable_avatar_parameters: false,
            ..OscConfig::default()
        };
        let caps = Capabilities::resolve(&osc, true);
        assert!(caps.transport);
        assert!(caps.position_tracking);
        assert!(!caps.avatar_parameters);
    }
}
