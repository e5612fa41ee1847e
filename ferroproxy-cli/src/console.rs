//! Line-oriented administration console
//!
//! Two modes, like a router CLI: exec mode (`# `) for inspection and
//! persistence, config mode (`(config)# `) for editing rules. Commands are
//! routed to the plugin registry, so every edit goes through the same
//! synchronized firewall handle the proxy uses.

use ferroproxy_plugin::PluginRegistry;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

const HELP: &str = "\
Available commands:
  show rules                 - Display current firewall rules
  configure terminal         - Enter configuration mode
  write memory               - Save rules to config file
  help                       - Show this help message

Configuration mode commands:
  rule add <allow|deny> [key=value ...]  - Add a rule
    Supported keys:
      src_ip, dst_ip, src_port, dst_port, domain, protocol, method, path, description
      (aliases: src, source, ip, dst, dest, destination, sport, source_port, port, dest_port, host, proto, desc)
  rule del <index>                        - Delete rule by index
  rule show <index>                       - Show a single rule
  exit                                    - Leave configuration mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Exec,
    Config,
}

pub struct Console {
    registry: Arc<PluginRegistry>,
    mode: Mode,
}

impl Console {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            mode: Mode::Exec,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self.mode {
            Mode::Exec => "# ",
            Mode::Config => "(config)# ",
        }
    }

    fn help(&self) -> String {
        let names = self.registry.command_names();
        if names.is_empty() {
            return HELP.to_string();
        }
        format!("{HELP}\n\nPlugin commands:\n  {}", names.join(", "))
    }

    /// Handle one input line; `None` when there is nothing to print.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let mut tokens = line.split_whitespace();
        let cmd = tokens.next()?.to_ascii_lowercase();
        let args: Vec<&str> = tokens.collect();
        let rest = args.join(" ");

        match self.mode {
            Mode::Exec => match cmd.as_str() {
                "help" | "?" => Some(self.help()),
                "configure" | "conf" => {
                    if matches!(args.first(), Some(&("terminal" | "t"))) {
                        self.mode = Mode::Config;
                        Some("Entering configuration mode.  Type 'exit' to leave.".to_string())
                    } else {
                        Some("Usage: configure terminal".to_string())
                    }
                }
                "wr" => self.registry.dispatch(&format!("write {rest}")),
                // Rule edits belong to config mode
                "rule" => Some(format!("Unknown command: {cmd}")),
                _ => self.registry.dispatch(&format!("{cmd} {rest}")),
            },
            Mode::Config => match cmd.as_str() {
                "exit" => {
                    self.mode = Mode::Exec;
                    Some("Leaving configuration mode.".to_string())
                }
                "rule" | "show" => self.registry.dispatch(&format!("{cmd} {rest}")),
                _ => Some(format!("Unknown config command: {cmd}")),
            },
        }
    }

    /// Read lines until end of input.
    pub fn run<R, W>(&mut self, input: R, mut output: W) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(
            output,
            "Entering firewall shell.  Type 'help' for assistance.  Ctrl+D to exit."
        )?;

        let mut lines = input.lines();
        loop {
            write!(output, "{}", self.prompt())?;
            output.flush()?;

            let Some(line) = lines.next() else {
                writeln!(output, "\nExiting shell.")?;
                return Ok(());
            };
            if let Some(reply) = self.handle_line(&line?) {
                writeln!(output, "{reply}")?;
            }
        }
    }
}
