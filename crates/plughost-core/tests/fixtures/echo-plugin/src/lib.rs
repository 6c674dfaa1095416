//! Echo plugin loaded through the platform loader by the host tests.

use plughost_sdk::prelude::*;

#[derive(Default)]
struct Echo {
    host_version: String,
}

impl Plugin for Echo {
    fn initialise(&mut self, host: HostInfo) -> Result<String, String> {
        host.host.log(LogLevel::Debug, "echo plugin ready");
        self.host_version = host.host_version;
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    fn action_journal_entry(&mut self, entry: &Value) -> bool {
        entry["event"] == "Docked"
    }

    fn action_command(&mut self, cmd: &str, args: &[String]) -> Option<Result<String, String>> {
        match cmd {
            "echo" => Some(Ok(args.join(","))),
            "host" => Some(Ok(self.host_version.clone())),
            _ => Some(Err("bad arg".to_string())),
        }
    }
}

export_plugin!(Echo, Echo::default);
