//! The `ssh` mode: hostnames parsed out of `~/.ssh/config` (`Host` lines,
//! wildcards skipped) plus `~/.ssh/known_hosts`, launched via `ssh <host>`
//! in a terminal on accept. The terminal launcher itself lives in
//! `core-terminal`; this mode only builds the command line.

use crate::{AcceptEvent, Mode, ModeResult, StateFlags};
use std::path::Path;

#[derive(Debug, Default)]
pub struct SshMode {
    hosts: Vec<String>,
}

impl SshMode {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_config(text: &str) -> Vec<String> {
        let mut hosts = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix("Host ").or_else(|| line.strip_prefix("Host\t")) else {
                continue;
            };
            for token in rest.split_whitespace() {
                if !token.contains(['*', '?']) {
                    hosts.push(token.to_string());
                }
            }
        }
        hosts
    }

    fn parse_known_hosts(text: &str) -> Vec<String> {
        let mut hosts = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('|') {
                continue;
            }
            if let Some(field) = line.split_whitespace().next() {
                for host in field.split(',') {
                    let host = host.trim_start_matches('[').split(']').next().unwrap_or(host);
                    if !host.is_empty() {
                        hosts.push(host.to_string());
                    }
                }
            }
        }
        hosts
    }

    fn load_from_home(home: &Path) -> Vec<String> {
        let mut hosts = std::collections::BTreeSet::new();
        if let Ok(text) = std::fs::read_to_string(home.join(".ssh/config")) {
            hosts.extend(Self::parse_config(&text));
        }
        if let Ok(text) = std::fs::read_to_string(home.join(".ssh/known_hosts")) {
            hosts.extend(Self::parse_known_hosts(&text));
        }
        hosts.into_iter().collect()
    }
}

impl Mode for SshMode {
    fn name(&self) -> &str {
        "ssh"
    }

    fn init(&mut self) -> anyhow::Result<()> {
        self.hosts = dirs::home_dir().map(|home| Self::load_from_home(&home)).unwrap_or_default();
        Ok(())
    }

    fn num_entries(&self) -> u32 {
        self.hosts.len() as u32
    }

    fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
        (want_text.then(|| self.hosts[idx as usize].clone()), StateFlags::empty())
    }

    fn completion(&self, idx: u32) -> String {
        self.hosts[idx as usize].clone()
    }

    fn result(&mut self, event: AcceptEvent, input: &str, idx: Option<u32>) -> ModeResult {
        if event == AcceptEvent::EntryDelete {
            return ModeResult::EntryDelete;
        }
        let host = match idx {
            Some(i) => self.hosts[i as usize].clone(),
            None => input.to_string(),
        };
        if host.is_empty() {
            return ModeResult::Ok;
        }
        match std::process::Command::new("ssh").arg(&host).spawn() {
            Ok(_) => ModeResult::Exit,
            Err(e) => {
                tracing::warn!(host, error = %e, "failed to launch ssh");
                ModeResult::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_skips_wildcards() {
        let text = "Host myserver\n  HostName example.com\nHost *\n  ForwardAgent yes\nHost a b\n";
        let hosts = SshMode::parse_config(text);
        assert_eq!(hosts, vec!["myserver".to_string(), "a".to_string(), "b".to_string()]);
    }

    #[test]
    fn parse_known_hosts_splits_comma_aliases() {
        let text = "host1,10.0.0.1 ssh-ed25519 AAAA...\n|1|hashed|line ssh-rsa AAAA...\n";
        let hosts = SshMode::parse_known_hosts(text);
        assert_eq!(hosts, vec!["host1".to_string(), "10.0.0.1".to_string()]);
    }

    #[test]
    fn parse_known_hosts_strips_bracketed_port() {
        let text = "[example.com]:2222 ssh-rsa AAAA...\n";
        let hosts = SshMode::parse_known_hosts(text);
        assert_eq!(hosts, vec!["example.com".to_string()]);
    }
}
