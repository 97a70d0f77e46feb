//! vcan interface management
//!
//! vcan devices are kernel-emulated CAN buses with no hardware behind them.
//! They are created and removed with iproute2's `ip link`, optionally via
//! sudo when the launcher is not running as root.

use super::NetworkProvisioner;
use crate::error::{Error, Result};
use crate::naming::ChannelName;
use std::process::Command;

/// Provisions vcan channels by invoking `ip link`
#[derive(Debug, Clone)]
pub struct IpLinkProvisioner {
    /// Path or name of the iproute2 binary
    ip_binary: String,
    /// Prefix every invocation with sudo
    use_sudo: bool,
}

impl Default for IpLinkProvisioner {
    fn default() -> Self {
        Self::new("ip", false)
    }
}

impl IpLinkProvisioner {
    pub fn new(ip_binary: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            ip_binary: ip_binary.into(),
            use_sudo,
        }
    }

    /// Build the command line for one `ip link` invocation
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.ip_binary);
            cmd
        } else {
            Command::new(&self.ip_binary)
        };
        cmd.arg("link").args(args);
        cmd
    }

    /// Run `ip link <args>` for a channel, mapping failure to a provisioning error
    fn ip_link(&self, channel: &ChannelName, args: &[&str]) -> Result<()> {
        let line = format!("ip link {}", args.join(" "));
        tracing::debug!("{}{}", if self.use_sudo { "sudo " } else { "" }, line);

        let output = self.command(args).output().map_err(|e| Error::Provisioning {
            channel: channel.to_string(),
            message: format!("Failed to run '{}': {}", line, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Provisioning {
                channel: channel.to_string(),
                message: format!("'{}' exited with {}: {}", line, output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

impl NetworkProvisioner for IpLinkProvisioner {
    fn create(&self, channel: &ChannelName) -> Result<()> {
        let name = channel.as_str();
        self.ip_link(channel, &["add", "dev", name, "type", "vcan"])?;

        if let Err(e) = self.ip_link(channel, &["set", "up", name]) {
            // Don't leave a half-created channel behind
            if let Err(rollback) = self.ip_link(channel, &["delete", name]) {
                tracing::warn!(
                    "Failed to remove half-created CAN channel {}: {}",
                    channel,
                    rollback
                );
            }
            return Err(e);
        }

        Ok(())
    }

    fn delete(&self, channel: &ChannelName) -> Result<()> {
        self.ip_link(channel, &["delete", channel.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Fake `ip` that records its arguments, accepts `add` and fails everything else
    fn fake_ip(dir: &Path) -> String {
        let script = dir.join("ip");
        fs::write(
            &script,
            "#!/bin/sh\n\
             echo \"$*\" >> \"$(dirname \"$0\")/calls\"\n\
             [ \"$2\" = add ] && exit 0\n\
             echo \"Operation not permitted\" >&2\n\
             exit 2\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    fn argv(cmd: &Command) -> Vec<String> {
        std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_without_sudo() {
        let p = IpLinkProvisioner::new("ip", false);
        let cmd = p.command(&["add", "dev", "a1b2c3d4", "type", "vcan"]);
        assert_eq!(argv(&cmd), ["ip", "link", "add", "dev", "a1b2c3d4", "type", "vcan"]);
    }

    #[test]
    fn test_command_with_sudo() {
        let p = IpLinkProvisioner::new("/sbin/ip", true);
        let cmd = p.command(&["delete", "a1b2c3d4"]);
        assert_eq!(argv(&cmd), ["sudo", "/sbin/ip", "link", "delete", "a1b2c3d4"]);
    }

    #[test]
    fn test_missing_binary_is_provisioning_error() {
        let p = IpLinkProvisioner::new("/nonexistent/candock-ip", false);
        let err = p.create(&ChannelName::from("a1b2c3d4")).unwrap_err();
        match err {
            Error::Provisioning { channel, .. } => assert_eq!(channel, "a1b2c3d4"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_set_up_rolls_back_link() {
        let dir = TempDir::new().unwrap();
        let p = IpLinkProvisioner::new(fake_ip(dir.path()), false);

        // Rollback fails too; the set up error is the one reported
        let err = p.create(&ChannelName::from("a1b2c3d4")).unwrap_err();
        match err {
            Error::Provisioning { channel, message } => {
                assert_eq!(channel, "a1b2c3d4");
                assert!(message.contains("set up"));
                assert!(message.contains("Operation not permitted"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let calls = fs::read_to_string(dir.path().join("calls")).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(
            calls,
            [
                "link add dev a1b2c3d4 type vcan",
                "link set up a1b2c3d4",
                "link delete a1b2c3d4"
            ]
        );
    }
}
